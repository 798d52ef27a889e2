//! Difference-of-Gaussians blob detector.

use common::MAX_DIMS;

use super::{Frame, SpotDetector};
use crate::config::BlobConfig;
use crate::error::Result;
use crate::filter::{gaussian_blur, median_filter_3x3};
use crate::maxima::{find_local_maxima, PeakSearch};
use crate::spot::{Calibration, Spot};

pub const NAME: &str = "DoG detector";

/// Blur already present in the image, in pixels.
const IMAGE_SIGMA: f64 = 0.5;

/// Smallest effective sigma, as a multiple of [`IMAGE_SIGMA`].
const MIN_SIGMA_FACTOR: f64 = 2.0;

/// Ratio of the two sigmas to the LoG-equivalent sigma.
const SIGMA_RATIOS: (f64, f64) = (0.9, 1.1);

/// Approximates the LoG response by subtracting a wider Gaussian blur from a
/// narrower one.
#[derive(Debug)]
pub struct DogDetector {
    config: BlobConfig,
}

impl DogDetector {
    pub fn new(config: BlobConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BlobConfig {
        &self.config
    }
}

/// Pixel sigmas of the narrow and wide blur for blobs of `radius`.
///
/// The narrow sigma is converted to pixels per axis and clamped from below;
/// the wide one keeps the physical ratio. Both are reduced by the blur the
/// image already carries.
pub(crate) fn sigma_pair(
    radius: f64,
    ndim: usize,
    calibration: &Calibration,
) -> ([f64; MAX_DIMS], [f64; MAX_DIMS]) {
    let base = radius / (ndim as f64).sqrt();
    let (sigma1, sigma2) = (base * SIGMA_RATIOS.0, base * SIGMA_RATIOS.1);
    let k = sigma2 / sigma1;

    let mut narrow = [0.0; MAX_DIMS];
    let mut wide = [0.0; MAX_DIMS];
    for d in 0..ndim {
        let s1 = (sigma1 / calibration.axis(d)).max(MIN_SIGMA_FACTOR * IMAGE_SIGMA);
        let s2 = k * s1;
        narrow[d] = (s1 * s1 - IMAGE_SIGMA * IMAGE_SIGMA).sqrt();
        wide[d] = (s2 * s2 - IMAGE_SIGMA * IMAGE_SIGMA).sqrt();
    }
    (narrow, wide)
}

impl SpotDetector for DogDetector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn process(&self, frame: &Frame) -> Result<Vec<Spot>> {
        let config = &self.config;
        let mut buffer = frame.crop();
        if config.median_filter {
            buffer = median_filter_3x3(&buffer, config.num_threads)?;
        }

        let (narrow, wide) = sigma_pair(config.radius, buffer.ndim(), &frame.calibration);
        let mut response = gaussian_blur(&buffer, narrow, config.num_threads)?;
        let background = gaussian_blur(&buffer, wide, config.num_threads)?;
        for (r, &b) in response.pixels_mut().iter_mut().zip(background.pixels()) {
            *r -= b;
        }

        let search = PeakSearch {
            threshold: config.threshold,
            radius: config.radius,
            calibration: frame.calibration,
            origin: frame.region().min(),
            subpixel: config.subpixel,
        };
        find_local_maxima(&response, &search, config.num_threads)
    }
}
