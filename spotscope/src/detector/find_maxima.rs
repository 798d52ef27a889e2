//! Tolerance-based maxima detector, in the manner of ImageJ's "Find Maxima".
//!
//! Expects an image that is already pre-processed so objects sit on local
//! maxima. Maxima are visited from brightest to dimmest; each one claims the
//! connected pixels lying at most `tolerance` below it, and any weaker maximum
//! inside that region is absorbed. A maximum on a flat top moves to the mean
//! position of the top. Maxima touching the image border are ignored.

use common::parallel::with_thread_budget;
use common::{Grid, MAX_DIMS};
use glam::DVec3;
use rayon::prelude::*;

use super::{Frame, SpotDetector};
use crate::config::FindMaximaConfig;
use crate::error::Result;
use crate::maxima::neighbor_offsets;
use crate::spot::Spot;

pub const NAME: &str = "Find maxima detector";

/// Height above the frame minimum, on top of the tolerance, that a maximum
/// must clear.
const PEAK_MARGIN: f64 = 2.0;

/// Pixels this close to the peak value belong to its flat top.
const PLATEAU_EPSILON: f64 = 1e-4;

type Pixel = [usize; MAX_DIMS];

#[derive(Debug)]
pub struct FindMaximaDetector {
    config: FindMaximaConfig,
}

impl FindMaximaDetector {
    pub fn new(config: FindMaximaConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &FindMaximaConfig {
        &self.config
    }
}

impl SpotDetector for FindMaximaDetector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn process(&self, frame: &Frame) -> Result<Vec<Spot>> {
        let config = &self.config;
        let source = frame.crop();
        let offsets = neighbor_offsets(source.ndim());

        let global_min = source.iter().fold(f64::INFINITY, |m, &v| m.min(v as f64));
        let floor = global_min + config.tolerance + PEAK_MARGIN;

        let candidates = with_thread_budget(config.num_threads, || {
            interior_maxima(&source, floor, &offsets)
        })?;
        let found = candidates.len();
        let peaks = resolve_peaks(&source, candidates, config.tolerance, &offsets);
        tracing::trace!(candidates = found, kept = peaks.len(), floor, "find maxima");

        let origin = frame.region().min();
        Ok(peaks
            .into_iter()
            .map(|p| {
                let pixel = DVec3::new(
                    (origin[0] + p[0]) as f64,
                    (origin[1] + p[1]) as f64,
                    (origin[2] + p[2]) as f64,
                );
                Spot::new(
                    frame.calibration.to_physical(pixel),
                    config.radius,
                    source[p] as f64,
                )
            })
            .collect())
    }
}

#[inline]
fn neighbor(p: Pixel, offset: &[isize; MAX_DIMS], dims: [usize; MAX_DIMS]) -> Option<Pixel> {
    let mut q = p;
    for d in 0..MAX_DIMS {
        q[d] = p[d].checked_add_signed(offset[d]).filter(|&v| v < dims[d])?;
    }
    Some(q)
}

fn has_brighter_neighbor(source: &Grid<f32>, p: Pixel, offsets: &[[isize; MAX_DIMS]]) -> bool {
    let dims = source.dims();
    offsets
        .iter()
        .filter_map(|o| neighbor(p, o, dims))
        .any(|q| source[q] > source[p])
}

/// Pixels off the border, strictly above `floor`, with no brighter
/// neighbour. Returned in raster order.
fn interior_maxima(source: &Grid<f32>, floor: f64, offsets: &[[isize; MAX_DIMS]]) -> Vec<Pixel> {
    let dims = source.dims();
    let ndim = source.ndim();
    let interior = move |p: &Pixel| (0..ndim).all(|d| p[d] >= 1 && p[d] + 1 < dims[d]);

    (0..dims[1] * dims[2])
        .into_par_iter()
        .flat_map_iter(|row| {
            let (y, z) = (row % dims[1], row / dims[1]);
            (0..dims[0]).map(move |x| [x, y, z]).filter(move |p| {
                interior(p)
                    && source[*p] as f64 > floor
                    && !has_brighter_neighbor(source, *p, offsets)
            })
        })
        .collect()
}

/// Flood-fills from each candidate, brightest first, and returns the
/// surviving peak positions in that order.
fn resolve_peaks(
    source: &Grid<f32>,
    mut candidates: Vec<Pixel>,
    tolerance: f64,
    offsets: &[[isize; MAX_DIMS]],
) -> Vec<Pixel> {
    // Stable, so equal maxima keep raster order.
    candidates.sort_by(|a, b| source[*b].total_cmp(&source[*a]));

    let dims = source.dims();
    let at = |p: Pixel| source.index(p[0], p[1], p[2]);
    let mut owner = vec![0u32; source.len()];
    let mut stack = Vec::new();
    let mut plateau = Vec::new();
    let mut peaks = Vec::with_capacity(candidates.len());

    for (rank, &peak) in candidates.iter().enumerate() {
        if owner[at(peak)] != 0 {
            continue;
        }
        let label = rank as u32 + 1;
        let top = source[peak] as f64;

        plateau.clear();
        stack.push(peak);
        while let Some(p) = stack.pop() {
            let i = at(p);
            if owner[i] != 0 {
                continue;
            }
            let fall = top - source[p] as f64;
            if !(0.0..=tolerance).contains(&fall) {
                continue;
            }
            owner[i] = label;
            if fall < PLATEAU_EPSILON {
                plateau.push(p);
            }
            stack.extend(
                offsets
                    .iter()
                    .filter_map(|o| neighbor(p, o, dims))
                    .filter(|&q| owner[at(q)] == 0),
            );
        }

        if plateau.len() <= 1 {
            peaks.push(peak);
            continue;
        }
        let center = plateau_center(&plateau);
        if owner[at(center)] == label && !has_brighter_neighbor(source, center, offsets) {
            peaks.push(center);
        } else {
            tracing::trace!(?peak, ?center, "flat maximum dropped");
        }
    }
    peaks
}

/// Integer mean position, rounded down.
fn plateau_center(plateau: &[Pixel]) -> Pixel {
    let mut sum = [0usize; MAX_DIMS];
    for p in plateau {
        for d in 0..MAX_DIMS {
            sum[d] += p[d];
        }
    }
    sum.map(|s| s / plateau.len())
}
