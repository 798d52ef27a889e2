//! Determinant-of-Hessian blob detector.

use common::parallel::with_thread_budget;
use common::{Grid, MAX_DIMS};
use rayon::prelude::*;

use super::{check_frame, Frame, SpotDetector};
use crate::config::HessianConfig;
use crate::error::{Error, Result};
use crate::filter::gaussian_blur;
use crate::maxima::{find_local_maxima, PeakSearch};
use crate::spot::{Calibration, Spot};

pub const NAME: &str = "Hessian detector";

/// Smooths at the configured scale, then scores every pixel by the
/// scale-normalized determinant of its Hessian. Bright blobs score
/// positive in both 2D and 3D.
#[derive(Debug)]
pub struct HessianDetector {
    config: HessianConfig,
}

impl HessianDetector {
    pub fn new(config: HessianConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &HessianConfig {
        &self.config
    }

    /// Smoothing sigma per axis, in pixels.
    fn sigmas(&self, ndim: usize, calibration: &Calibration) -> [f64; MAX_DIMS] {
        let radius = [self.config.radius_xy, self.config.radius_xy, self.config.radius_z];
        let mut sigmas = [0.0; MAX_DIMS];
        for d in 0..ndim {
            sigmas[d] = radius[d] / calibration.axis(d) / (ndim as f64).sqrt();
        }
        sigmas
    }
}

impl SpotDetector for HessianDetector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn check_input(&self, frame: &Frame) -> Result<()> {
        check_frame(frame)?;
        let ndim = frame.ndim();
        if !(2..=3).contains(&ndim) {
            return Err(Error::Dimensionality {
                detector: NAME,
                expected: "2D or 3D",
                ndim,
            });
        }
        Ok(())
    }

    fn process(&self, frame: &Frame) -> Result<Vec<Spot>> {
        let config = &self.config;
        let buffer = frame.crop();
        let sigmas = self.sigmas(buffer.ndim(), &frame.calibration);

        let smoothed = gaussian_blur(&buffer, sigmas, config.num_threads)?;
        let mut response = hessian_determinant(&smoothed, sigmas, config.num_threads)?;
        if config.normalize {
            normalize(&mut response);
        }

        let search = PeakSearch {
            threshold: config.threshold,
            radius: config.radius_xy,
            calibration: frame.calibration,
            origin: frame.region().min(),
            subpixel: config.subpixel,
        };
        find_local_maxima(&response, &search, config.num_threads)
    }
}

// ============================================================================
// Hessian
// ============================================================================

/// Neighbour of `p` one step along `axis`, clamped to the grid.
#[inline]
fn step(p: [usize; MAX_DIMS], axis: usize, forward: bool, dims: [usize; MAX_DIMS]) -> [usize; MAX_DIMS] {
    let mut q = p;
    if forward {
        q[axis] = (p[axis] + 1).min(dims[axis] - 1);
    } else {
        q[axis] = p[axis].saturating_sub(1);
    }
    q
}

/// Central difference along `axis` with border replication.
fn central_difference(grid: &Grid<f32>, axis: usize) -> Grid<f32> {
    let dims = grid.dims();
    let [w, h, _] = dims;
    let mut out = grid.clone();
    out.pixels_mut()
        .par_chunks_mut(w)
        .enumerate()
        .for_each(|(row, out_row)| {
            let (y, z) = (row % h, row / h);
            for (x, out) in out_row.iter_mut().enumerate() {
                let p = [x, y, z];
                let [fx, fy, fz] = step(p, axis, true, dims);
                let [bx, by, bz] = step(p, axis, false, dims);
                *out = (grid.get(fx, fy, fz) - grid.get(bx, by, bz)) * 0.5;
            }
        });
    out
}

/// Determinant of the Hessian of `smoothed`, each entry `H_ij` scaled by
/// `sigma_i * sigma_j`. Negated in 3D so bright blobs are positive.
pub(crate) fn hessian_determinant(
    smoothed: &Grid<f32>,
    sigmas: [f64; MAX_DIMS],
    num_threads: usize,
) -> Result<Grid<f32>> {
    let ndim = smoothed.ndim();
    debug_assert!((2..=3).contains(&ndim));

    let det = with_thread_budget(num_threads, || {
        let gradient: Vec<Grid<f32>> = (0..ndim)
            .map(|d| central_difference(smoothed, d))
            .collect();

        // Upper triangle, row major: 00 01 (02) 11 (12) (22).
        let mut entries = Vec::with_capacity(ndim * (ndim + 1) / 2);
        for i in 0..ndim {
            for j in i..ndim {
                let mut h = central_difference(&gradient[i], j);
                let scale = (sigmas[i] * sigmas[j]) as f32;
                h.pixels_mut().iter_mut().for_each(|v| *v *= scale);
                entries.push(h);
            }
        }

        let mut det = smoothed.clone();
        det.pixels_mut()
            .par_iter_mut()
            .enumerate()
            .for_each(|(idx, out)| {
                let e = |k: usize| entries[k].pixels()[idx] as f64;
                let value = if ndim == 2 {
                    e(0) * e(2) - e(1) * e(1)
                } else {
                    let (a00, a01, a02, a11, a12, a22) = (e(0), e(1), e(2), e(3), e(4), e(5));
                    let x = a11 * a22 - a12 * a12;
                    let y = a01 * a22 - a02 * a12;
                    let z = a01 * a12 - a02 * a11;
                    -(a00 * x - a01 * y + a02 * z)
                };
                *out = value as f32;
            });
        det
    })?;
    Ok(det)
}

/// Rescales `grid` linearly to [0, 1]. A constant grid becomes all zeros.
pub(crate) fn normalize(grid: &mut Grid<f32>) {
    let (min, max) = grid
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = max - min;
    if range.is_nan() || range <= 0.0 {
        grid.pixels_mut().fill(0.0);
        return;
    }
    for v in grid.pixels_mut() {
        *v = (*v - min) / range;
    }
}
