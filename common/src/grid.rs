use std::ops::{Deref, DerefMut, Index, IndexMut};
use std::slice;

use crate::interval::Interval;

/// Maximum number of spatial axes supported by [`Grid`].
pub const MAX_DIMS: usize = 3;

/// Dense row-major array with up to three axes.
///
/// x varies fastest, then y, then z. Axes beyond `ndim` have extent 1 so that
/// every grid can be addressed with `[x, y, z]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    pixels: Vec<T>,
    dims: [usize; MAX_DIMS],
    ndim: usize,
}

impl<T> Grid<T> {
    pub fn new(dims: &[usize], pixels: Vec<T>) -> Self {
        let (dims, ndim) = expand_dims(dims);
        assert_eq!(
            pixels.len(),
            dims.iter().product::<usize>(),
            "pixels length must equal the product of dimensions"
        );
        Self { pixels, dims, ndim }
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.ndim
    }

    #[inline]
    pub fn dims(&self) -> [usize; MAX_DIMS] {
        self.dims
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.dims[0]
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.dims[1]
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.dims[2]
    }

    /// Linear offset between neighbours along each axis.
    #[inline]
    pub fn strides(&self) -> [usize; MAX_DIMS] {
        [1, self.dims[0], self.dims[0] * self.dims[1]]
    }

    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        debug_assert!(x < self.dims[0] && y < self.dims[1] && z < self.dims[2]);
        (z * self.dims[1] + y) * self.dims[0] + x
    }

    /// Inverse of [`Grid::index`].
    #[inline]
    pub fn coords(&self, idx: usize) -> [usize; MAX_DIMS] {
        let plane = self.dims[0] * self.dims[1];
        let z = idx / plane;
        let rem = idx % plane;
        [rem % self.dims[0], rem / self.dims[0], z]
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> &T {
        &self.pixels[self.index(x, y, z)]
    }

    #[inline]
    pub fn get_mut(&mut self, x: usize, y: usize, z: usize) -> &mut T {
        let idx = self.index(x, y, z);
        &mut self.pixels[idx]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    #[inline]
    pub fn pixels(&self) -> &[T] {
        &self.pixels
    }

    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [T] {
        &mut self.pixels
    }

    #[inline]
    pub fn into_vec(self) -> Vec<T> {
        self.pixels
    }

    #[inline]
    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.pixels.iter()
    }

    #[inline]
    pub fn iter_mut(&mut self) -> slice::IterMut<'_, T> {
        self.pixels.iter_mut()
    }

    /// One xy-plane.
    #[inline]
    pub fn plane(&self, z: usize) -> &[T] {
        let len = self.dims[0] * self.dims[1];
        &self.pixels[z * len..(z + 1) * len]
    }

    #[inline]
    pub fn plane_mut(&mut self, z: usize) -> &mut [T] {
        let len = self.dims[0] * self.dims[1];
        &mut self.pixels[z * len..(z + 1) * len]
    }

    /// Interval covering the whole grid.
    pub fn interval(&self) -> Interval {
        Interval::from_dims(&self.dims[..self.ndim])
    }

    pub fn map<U>(&self, f: impl Fn(&T) -> U) -> Grid<U> {
        Grid {
            pixels: self.pixels.iter().map(f).collect(),
            dims: self.dims,
            ndim: self.ndim,
        }
    }
}

impl<T: Clone> Grid<T> {
    pub fn new_filled(dims: &[usize], value: T) -> Self {
        let (dims, ndim) = expand_dims(dims);
        Self {
            pixels: vec![value; dims.iter().product()],
            dims,
            ndim,
        }
    }

    #[inline]
    pub fn fill(&mut self, value: T) {
        self.pixels.fill(value);
    }

    /// Copies the region covered by `interval` into a new zero-based grid.
    ///
    /// The result takes the interval's dimensionality, so cropping a single
    /// plane out of a volume with a squeezed interval yields a 2D grid.
    pub fn crop(&self, interval: &Interval) -> Grid<T> {
        assert!(
            interval.fits_in(self.dims),
            "interval {interval:?} exceeds grid extent {:?}",
            self.dims
        );
        let min = interval.min();
        let dims = interval.dims();
        let mut pixels = Vec::with_capacity(interval.num_elements());
        for z in 0..dims[2] {
            for y in 0..dims[1] {
                let start = self.index(min[0], min[1] + y, min[2] + z);
                pixels.extend_from_slice(&self.pixels[start..start + dims[0]]);
            }
        }
        Grid {
            pixels,
            dims,
            ndim: interval.ndim(),
        }
    }
}

impl<T: Default + Clone> Grid<T> {
    pub fn new_default(dims: &[usize]) -> Self {
        Self::new_filled(dims, T::default())
    }
}

fn expand_dims(dims: &[usize]) -> ([usize; MAX_DIMS], usize) {
    assert!(
        (1..=MAX_DIMS).contains(&dims.len()),
        "grid must have 1 to {MAX_DIMS} dimensions"
    );
    let mut out = [1; MAX_DIMS];
    out[..dims.len()].copy_from_slice(dims);
    (out, dims.len())
}

impl<T> Index<[usize; MAX_DIMS]> for Grid<T> {
    type Output = T;

    #[inline]
    fn index(&self, [x, y, z]: [usize; MAX_DIMS]) -> &Self::Output {
        &self.pixels[(z * self.dims[1] + y) * self.dims[0] + x]
    }
}

impl<T> IndexMut<[usize; MAX_DIMS]> for Grid<T> {
    #[inline]
    fn index_mut(&mut self, [x, y, z]: [usize; MAX_DIMS]) -> &mut Self::Output {
        &mut self.pixels[(z * self.dims[1] + y) * self.dims[0] + x]
    }
}

impl<T> Deref for Grid<T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.pixels
    }
}

impl<T> DerefMut for Grid<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.pixels
    }
}
