//! LoG detection on a box-averaged copy of the image.

use common::MAX_DIMS;
use glam::DVec3;

use super::log::LogDetector;
use super::{Frame, SpotDetector};
use crate::config::{BlobConfig, DownsampleLogConfig};
use crate::error::Result;
use crate::filter::box_downsample;
use crate::spot::{Calibration, Spot};

pub const NAME: &str = "Downsampled LoG detector";

/// Trades localization precision for speed on large blobs: the region is
/// averaged over boxes of `downsample_factor` pixels, searched with a plain
/// LoG detector, and each peak is reported at the center of its box.
#[derive(Debug)]
pub struct DownsampleLogDetector {
    config: DownsampleLogConfig,
    inner: LogDetector,
}

impl DownsampleLogDetector {
    pub fn new(config: DownsampleLogConfig) -> Result<Self> {
        config.validate()?;
        let inner = LogDetector::new(BlobConfig {
            radius: config.radius,
            threshold: config.threshold,
            subpixel: false,
            median_filter: false,
            num_threads: config.num_threads,
        })?;
        Ok(Self { config, inner })
    }

    pub fn config(&self) -> &DownsampleLogConfig {
        &self.config
    }
}

/// Box size per axis. Along z the factor shrinks by the voxel aspect ratio,
/// so coarse z sampling is not reduced further.
pub(crate) fn downsample_factors(
    factor: usize,
    ndim: usize,
    calibration: &Calibration,
) -> [usize; MAX_DIMS] {
    let mut factors = [1; MAX_DIMS];
    for f in factors.iter_mut().take(ndim.min(2)) {
        *f = factor;
    }
    if ndim > 2 {
        let z_ratio = calibration.axis(2) / calibration.axis(0);
        factors[2] = ((factor as f64 / z_ratio).round() as usize).max(1);
    }
    factors
}

impl SpotDetector for DownsampleLogDetector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn process(&self, frame: &Frame) -> Result<Vec<Spot>> {
        let region = frame.region();
        let ndim = region.ndim();
        let factors = downsample_factors(self.config.downsample_factor, ndim, &frame.calibration);

        let coarse = box_downsample(&frame.crop(), factors);
        tracing::trace!(?factors, dims = ?coarse.dims(), "downsampled");
        let coarse_calibration = frame.calibration.scaled(factors);
        let mut spots = self
            .inner
            .detect_buffer(coarse, [0; MAX_DIMS], coarse_calibration)?;

        // Coarse pixel j covers source pixels [j*f, (j+1)*f); report its center.
        let cal = DVec3::from(frame.calibration.0);
        let origin = region.min().map(|v| v as f64);
        for spot in &mut spots {
            let mut pixel = spot.position / cal;
            for d in 0..MAX_DIMS {
                pixel[d] = if d < ndim {
                    origin[d] + pixel[d] + (factors[d] as f64 - 1.0) / 2.0
                } else {
                    origin[d]
                };
            }
            spot.position = pixel * cal;
        }
        Ok(spots)
    }
}
