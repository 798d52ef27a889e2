//! Convolution kernels.
//!
//! The Laplacian-of-Gaussian kernel is sampled in physical units and scaled by
//! the pixel volume, which makes the filtered peak height independent of the
//! image calibration: doubling both the pixel size and the radius gives the
//! same kernel weights.

#[cfg(test)]
mod tests;

use std::f64::consts::PI;

use common::{Grid, MAX_DIMS};

use crate::spot::Calibration;

/// Empirical scale bringing LoG responses to the order of raw intensities.
const LOG_NORMALIZATION: f64 = 1.0 / 20.0;

/// Dense, zero-centered weights.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    weights: Grid<f64>,
    center: [usize; MAX_DIMS],
}

impl Kernel {
    #[inline]
    pub fn weights(&self) -> &Grid<f64> {
        &self.weights
    }

    /// Index of the kernel origin along each axis.
    #[inline]
    pub fn center(&self) -> [usize; MAX_DIMS] {
        self.center
    }

    #[inline]
    pub fn dims(&self) -> [usize; MAX_DIMS] {
        self.weights.dims()
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.weights.ndim()
    }
}

/// Builds the normalized, sign-flipped LoG kernel for blobs of `radius`
/// (physical units) in `ndim` dimensions.
///
/// Bright blobs give positive responses.
pub fn log_kernel(radius: f64, ndim: usize, calibration: &Calibration) -> Kernel {
    assert!((1..=MAX_DIMS).contains(&ndim), "ndim must be 1 to 3");
    assert!(radius > 0.0, "radius must be positive");

    let sigma = radius / (ndim as f64).sqrt();
    let sigma_sq = sigma * sigma;

    let mut sizes = [1usize; MAX_DIMS];
    let mut center = [0usize; MAX_DIMS];
    for d in 0..ndim {
        let sigma_px = sigma / calibration.axis(d);
        let half = ((3.0 * sigma_px).round() as usize + 1).max(2);
        sizes[d] = 3 + 2 * half;
        center[d] = 1 + half;
    }

    let c = LOG_NORMALIZATION
        * (1.0 / (sigma * (2.0 * PI).sqrt())).powi(ndim as i32)
        * calibration.cell_volume(ndim);

    let mut weights = Grid::new_default(&sizes[..ndim]);
    for z in 0..sizes[2] {
        for y in 0..sizes[1] {
            for x in 0..sizes[0] {
                let pos = [x, y, z];
                let mut mantissa = 0.0;
                let mut exponent = 0.0;
                for d in 0..ndim {
                    let offset = calibration.axis(d) * (pos[d] as f64 - center[d] as f64);
                    let ratio = offset * offset / sigma_sq;
                    mantissa += -c * (ratio - 1.0);
                    exponent += -ratio / 2.0;
                }
                *weights.get_mut(x, y, z) = mantissa * exponent.exp();
            }
        }
    }

    Kernel { weights, center }
}

/// Half-width in taps of the Gaussian for `sigma` pixels:
/// `max(2, round(3 * sigma) + 1)`.
pub fn gaussian_half_width(sigma: f64) -> usize {
    ((3.0 * sigma).round() as usize + 1).max(2)
}

/// Normalized 1D Gaussian for a sigma in pixels, spanning
/// `2 * gaussian_half_width(sigma) + 1` taps.
pub fn gaussian_kernel_1d(sigma: f64) -> Vec<f64> {
    assert!(sigma > 0.0, "Sigma must be positive");

    let radius = gaussian_half_width(sigma);
    let two_sigma_sq = 2.0 * sigma * sigma;

    let mut kernel: Vec<f64> = (0..2 * radius + 1)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-x * x / two_sigma_sq).exp()
        })
        .collect();

    let sum: f64 = kernel.iter().sum();
    for v in &mut kernel {
        *v /= sum;
    }

    kernel
}
