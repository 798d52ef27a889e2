use serde::{Deserialize, Serialize};

use crate::grid::MAX_DIMS;

/// Axis-aligned integer box with inclusive bounds.
///
/// Axes beyond `ndim` always span a single plane. A squeezed interval keeps
/// the plane index, so a 2D view of one z-slice still knows where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    min: [usize; MAX_DIMS],
    max: [usize; MAX_DIMS],
    ndim: usize,
}

impl Interval {
    pub fn new(min: &[usize], max: &[usize]) -> Self {
        assert_eq!(min.len(), max.len(), "min/max dimensionality mismatch");
        assert!(
            (1..=MAX_DIMS).contains(&min.len()),
            "interval must have 1 to {MAX_DIMS} dimensions"
        );
        let mut lo = [0; MAX_DIMS];
        let mut hi = [0; MAX_DIMS];
        for d in 0..min.len() {
            assert!(min[d] <= max[d], "min must not exceed max on axis {d}");
            lo[d] = min[d];
            hi[d] = max[d];
        }
        Self {
            min: lo,
            max: hi,
            ndim: min.len(),
        }
    }

    /// Interval covering a full grid of the given extent.
    pub fn from_dims(dims: &[usize]) -> Self {
        assert!(dims.iter().all(|&d| d > 0), "dimensions must be non-zero");
        let max: Vec<usize> = dims.iter().map(|&d| d - 1).collect();
        Self::new(&vec![0; dims.len()], &max)
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.ndim
    }

    #[inline]
    pub fn min(&self) -> [usize; MAX_DIMS] {
        self.min
    }

    #[inline]
    pub fn max(&self) -> [usize; MAX_DIMS] {
        self.max
    }

    /// Extent per axis; unused axes report 1.
    #[inline]
    pub fn dims(&self) -> [usize; MAX_DIMS] {
        [
            self.max[0] - self.min[0] + 1,
            self.max[1] - self.min[1] + 1,
            self.max[2] - self.min[2] + 1,
        ]
    }

    #[inline]
    pub fn num_elements(&self) -> usize {
        self.dims().iter().product()
    }

    #[inline]
    pub fn contains_point(&self, p: [usize; MAX_DIMS]) -> bool {
        (0..MAX_DIMS).all(|d| p[d] >= self.min[d] && p[d] <= self.max[d])
    }

    #[inline]
    pub fn contains(&self, other: &Interval) -> bool {
        self.contains_point(other.min) && self.contains_point(other.max)
    }

    /// Whether the interval lies inside a grid with the given extent.
    #[inline]
    pub fn fits_in(&self, dims: [usize; MAX_DIMS]) -> bool {
        (0..MAX_DIMS).all(|d| self.max[d] < dims[d])
    }

    /// Box with the given bounds and this interval's dimensionality.
    ///
    /// Panics unless the box lies inside `self`.
    pub fn sub_interval(&self, min: [usize; MAX_DIMS], max: [usize; MAX_DIMS]) -> Self {
        let sub = Self {
            min,
            max,
            ndim: self.ndim,
        };
        assert!(
            (0..MAX_DIMS).all(|d| min[d] <= max[d]) && self.contains(&sub),
            "sub-interval {sub:?} is not inside {self:?}"
        );
        sub
    }

    /// Drops trailing axes of extent 1, keeping at least one axis.
    pub fn squeeze(&self) -> Self {
        let dims = self.dims();
        let mut ndim = self.ndim;
        while ndim > 1 && dims[ndim - 1] == 1 {
            ndim -= 1;
        }
        Self { ndim, ..*self }
    }
}
