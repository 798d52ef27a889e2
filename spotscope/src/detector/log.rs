//! Laplacian-of-Gaussian blob detector.

use std::sync::Arc;

use common::{Grid, MAX_DIMS};
use parking_lot::Mutex;

use super::{Frame, SpotDetector};
use crate::config::BlobConfig;
use crate::convolution::fft_convolve;
use crate::error::Result;
use crate::filter::median_filter_3x3;
use crate::kernel::{log_kernel, Kernel};
use crate::maxima::{find_local_maxima, PeakSearch};
use crate::spot::{Calibration, Spot};

pub const NAME: &str = "LoG detector";

/// Last kernel built, keyed by what it depends on besides the radius.
#[derive(Debug, Default)]
pub(crate) struct KernelCache {
    slot: Mutex<Option<(Calibration, usize, Arc<Kernel>)>>,
}

impl KernelCache {
    /// Returns the cached kernel for `(calibration, ndim)`, building it on a
    /// miss. Frames with the same geometry share one kernel.
    pub(crate) fn get_or_build(
        &self,
        calibration: Calibration,
        ndim: usize,
        build: impl FnOnce() -> Kernel,
    ) -> Arc<Kernel> {
        let mut slot = self.slot.lock();
        if let Some((cal, n, kernel)) = slot.as_ref() {
            if *cal == calibration && *n == ndim {
                return Arc::clone(kernel);
            }
        }
        let kernel = Arc::new(build());
        tracing::debug!(ndim, dims = ?kernel.dims(), "built LoG kernel");
        *slot = Some((calibration, ndim, Arc::clone(&kernel)));
        kernel
    }
}

/// Convolves with a scale-normalized LoG kernel matched to the configured
/// radius and reports the strict local maxima of the response.
#[derive(Debug)]
pub struct LogDetector {
    config: BlobConfig,
    kernels: KernelCache,
}

impl LogDetector {
    pub fn new(config: BlobConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            kernels: KernelCache::default(),
        })
    }

    pub fn config(&self) -> &BlobConfig {
        &self.config
    }

    /// Detects spots in a zero-based buffer that sits at `origin` in the
    /// source image.
    pub(crate) fn detect_buffer(
        &self,
        buffer: Grid<f32>,
        origin: [usize; MAX_DIMS],
        calibration: Calibration,
    ) -> Result<Vec<Spot>> {
        let config = &self.config;
        let buffer = if config.median_filter {
            median_filter_3x3(&buffer, config.num_threads)?
        } else {
            buffer
        };

        let ndim = buffer.ndim();
        let kernel = self.kernels.get_or_build(calibration, ndim, || {
            log_kernel(config.radius, ndim, &calibration)
        });
        let response = fft_convolve(&buffer, &kernel, config.num_threads)?;

        let search = PeakSearch {
            threshold: config.threshold,
            radius: config.radius,
            calibration,
            origin,
            subpixel: config.subpixel,
        };
        find_local_maxima(&response, &search, config.num_threads)
    }
}

impl SpotDetector for LogDetector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn process(&self, frame: &Frame) -> Result<Vec<Spot>> {
        self.detect_buffer(frame.crop(), frame.region().min(), frame.calibration)
    }
}
