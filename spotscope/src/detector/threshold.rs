//! Intensity-threshold segmentation detector.

use super::{Frame, SpotDetector};
use crate::config::{Threshold, ThresholdConfig};
use crate::error::Result;
use crate::segment::{label_components, otsu_threshold, threshold_mask};
use crate::shapes::{polygon_spots, region_spots, threshold_meshes, ShapeOptions};
use crate::spot::Spot;

pub const NAME: &str = "Threshold detector";

/// Segments pixels above a fixed or Otsu threshold into connected objects.
///
/// With shapes enabled, 2D objects carry their traced outline and 3D objects
/// the iso-surface mesh at the threshold. Otherwise, and always in 1D, each
/// object is reduced to its centroid and equivalent radius. A fixed
/// threshold of 0 imports a binary mask.
#[derive(Debug)]
pub struct ThresholdDetector {
    config: ThresholdConfig,
}

impl ThresholdDetector {
    pub fn new(config: ThresholdConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Detector for binary masks: every pixel above 0 is foreground.
    pub fn mask(config: ThresholdConfig) -> Result<Self> {
        Self::new(ThresholdConfig {
            threshold: Threshold::Fixed(0.0),
            ..config
        })
    }

    pub fn config(&self) -> &ThresholdConfig {
        &self.config
    }

    fn shape_options(&self) -> ShapeOptions {
        ShapeOptions {
            simplify: self.config.simplify,
            smoothing_scale: self.config.smoothing_scale,
            num_threads: self.config.num_threads,
        }
    }
}

impl SpotDetector for ThresholdDetector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn process(&self, frame: &Frame) -> Result<Vec<Spot>> {
        let config = &self.config;
        let buffer = frame.crop();
        let quality = frame.crop_quality();
        let placement = frame.placement(quality.as_ref());
        let options = self.shape_options();

        let threshold = match config.threshold {
            Threshold::Fixed(value) => value,
            Threshold::Otsu => otsu_threshold(buffer.pixels()),
        };

        let ndim = buffer.ndim();
        if config.shapes && ndim == 3 {
            return Ok(threshold_meshes(&buffer, threshold, &placement, &options));
        }

        let labels = label_components(
            &threshold_mask(&buffer, threshold),
            config.connectivity,
            config.num_threads,
        )?;
        tracing::trace!(threshold, objects = labels.num_labels(), "thresholded");

        if config.shapes && ndim == 2 {
            polygon_spots(&labels, &placement, &options)
        } else {
            Ok(region_spots(&labels, &placement))
        }
    }
}
