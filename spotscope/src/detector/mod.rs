//! Spot detectors.
//!
//! Every strategy implements [`SpotDetector`] on top of one configuration
//! struct. The blob filters (LoG, DoG, Hessian) enhance the image and hand
//! the response to the maxima finder. The find-maxima detector skips the
//! filter and separates maxima of the raw image by a tolerance. The
//! segmentation detectors label the image and turn each region into a spot,
//! optionally with its outline or surface mesh. Downsampled and tiled LoG
//! wrap a [`LogDetector`] instead of re-implementing it.

pub mod block;
pub mod dog;
pub mod downsample;
pub mod find_maxima;
pub mod hessian;
pub mod label_image;
pub mod log;
pub mod threshold;


use std::time::Instant;

use common::parallel::with_thread_budget;
use common::{Grid, Interval};
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::shapes::Placement;
use crate::spot::{Calibration, Spot};

pub use block::BlockLogDetector;
pub use dog::DogDetector;
pub use downsample::DownsampleLogDetector;
pub use find_maxima::FindMaximaDetector;
pub use hessian::HessianDetector;
pub use label_image::LabelImageDetector;
pub use log::LogDetector;
pub use threshold::ThresholdDetector;

// ============================================================================
// Frame
// ============================================================================

/// One single-channel, single-time-point image plus the region to analyse.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub grid: &'a Grid<f32>,
    /// Region of `grid` to analyse. A trailing z extent of 1 makes a 3D grid
    /// behave as a 2D image.
    pub interval: Interval,
    pub calibration: Calibration,
    /// Optional image whose maximum over each object becomes its quality.
    /// Must have the same extent as `grid`.
    pub quality: Option<&'a Grid<f32>>,
}

impl<'a> Frame<'a> {
    /// Whole grid with unit calibration and no quality image.
    ///
    /// An empty grid gets a one-pixel interval, which [`check_frame`] rejects.
    pub fn new(grid: &'a Grid<f32>) -> Self {
        let extent = grid.dims().map(|d| d.max(1));
        Self {
            grid,
            interval: Interval::from_dims(&extent[..grid.ndim()]),
            calibration: Calibration::default(),
            quality: None,
        }
    }

    pub fn with_interval(mut self, interval: Interval) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_calibration(mut self, calibration: Calibration) -> Self {
        self.calibration = calibration;
        self
    }

    pub fn with_quality(mut self, quality: &'a Grid<f32>) -> Self {
        self.quality = Some(quality);
        self
    }

    /// Analysed region with trailing singleton axes dropped.
    #[inline]
    pub fn region(&self) -> Interval {
        self.interval.squeeze()
    }

    /// Dimensionality the detectors see.
    #[inline]
    pub fn ndim(&self) -> usize {
        self.region().ndim()
    }

    /// Zero-based copy of the analysed region.
    pub fn crop(&self) -> Grid<f32> {
        self.grid.crop(&self.region())
    }

    /// Quality image cropped like [`Frame::crop`].
    pub fn crop_quality(&self) -> Option<Grid<f32>> {
        self.quality.map(|q| q.crop(&self.region()))
    }

    /// Placement of the cropped region, for the shape builders.
    pub(crate) fn placement<'q>(&self, quality: Option<&'q Grid<f32>>) -> Placement<'q> {
        Placement {
            origin: self.region().min(),
            calibration: self.calibration,
            quality,
        }
    }
}

/// Checks shared by every detector: the interval lies inside the grid, the
/// quality image matches it and the calibration is usable.
pub fn check_frame(frame: &Frame) -> Result<()> {
    let dims = frame.grid.dims();
    if frame.grid.is_empty() || !frame.interval.fits_in(dims) {
        return Err(Error::IntervalOutOfBounds {
            interval: frame.interval,
            dims,
        });
    }
    if let Some(quality) = frame.quality {
        if quality.dims() != dims {
            return Err(Error::QualityImageMismatch {
                expected: dims,
                actual: quality.dims(),
            });
        }
    }
    frame.calibration.validate()
}

// ============================================================================
// Detector trait
// ============================================================================

/// A spot detection strategy.
///
/// Detectors are built from a validated configuration and hold no per-frame
/// state, so one instance can serve many frames concurrently.
pub trait SpotDetector: Send + Sync {
    /// Human-readable name, used to prefix error messages.
    fn name(&self) -> &'static str;

    /// Validates the frame before any work is done.
    fn check_input(&self, frame: &Frame) -> Result<()> {
        check_frame(frame)
    }

    /// Runs the detection. Assumes [`SpotDetector::check_input`] passed.
    fn process(&self, frame: &Frame) -> Result<Vec<Spot>>;

    /// Checks the input, then processes it. Errors carry the detector name.
    fn detect(&self, frame: &Frame) -> Result<Vec<Spot>> {
        let start = Instant::now();
        let spots = self
            .check_input(frame)
            .and_then(|()| self.process(frame))
            .map_err(|e| e.in_detector(self.name()))?;
        tracing::debug!(
            detector = self.name(),
            count = spots.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "detection finished"
        );
        Ok(spots)
    }
}

/// Runs `detector` on every frame, `num_threads` frames at a time.
///
/// Results come back in frame order. A failing frame does not affect the
/// others; only a failure to build the pool fails the whole call.
pub fn detect_frames<D>(
    detector: &D,
    frames: &[Frame],
    num_threads: usize,
) -> Result<Vec<Result<Vec<Spot>>>>
where
    D: SpotDetector + ?Sized,
{
    if num_threads == 0 {
        return Err(Error::invalid("num_threads must be at least 1"));
    }
    let results = with_thread_budget(num_threads, || {
        frames
            .par_iter()
            .map(|frame| detector.detect(frame))
            .collect::<Vec<_>>()
    })?;
    let failed = results.iter().filter(|r| r.is_err()).count();
    if failed > 0 {
        tracing::warn!(failed, total = frames.len(), "some frames failed");
    }
    Ok(results)
}

// ============================================================================
// Deduplication
// ============================================================================

/// Removes overlapping detections, keeping the higher-quality one.
///
/// Two spots overlap when their squared distance is at most the product of
/// their radii. The result is sorted by descending quality. Returns the
/// number of spots removed.
pub fn dedup_spots(spots: &mut Vec<Spot>) -> usize {
    if spots.len() < 2 {
        return 0;
    }

    spots.sort_by(|a, b| b.quality.total_cmp(&a.quality));
    let mut kept = vec![true; spots.len()];

    for i in 0..spots.len() {
        if !kept[i] {
            continue;
        }
        for j in (i + 1)..spots.len() {
            if !kept[j] {
                continue;
            }
            if spots[i].distance_squared(&spots[j]) <= spots[i].radius * spots[j].radius {
                kept[j] = false;
            }
        }
    }

    let before = spots.len();
    let mut flags = kept.into_iter();
    spots.retain(|_| flags.next().unwrap_or(false));
    before - spots.len()
}
