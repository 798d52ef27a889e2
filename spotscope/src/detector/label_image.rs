//! Detector importing an existing label image.

use super::{Frame, SpotDetector};
use crate::config::LabelImageConfig;
use crate::error::Result;
use crate::segment::LabelMap;
use crate::shapes::{label_meshes, polygon_spots, region_spots, ShapeOptions};
use crate::spot::Spot;

pub const NAME: &str = "Label image detector";

/// Treats each positive integer value of the image as one object. Pixels of
/// one label need not be connected; in 2D every connected piece gets its own
/// outline.
#[derive(Debug)]
pub struct LabelImageDetector {
    config: LabelImageConfig,
}

impl LabelImageDetector {
    pub fn new(config: LabelImageConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &LabelImageConfig {
        &self.config
    }
}

impl SpotDetector for LabelImageDetector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn process(&self, frame: &Frame) -> Result<Vec<Spot>> {
        let config = &self.config;
        let labels = LabelMap::from_label_grid(&frame.crop());
        let quality = frame.crop_quality();
        let placement = frame.placement(quality.as_ref());
        let options = ShapeOptions {
            simplify: config.simplify,
            smoothing_scale: config.smoothing_scale,
            num_threads: config.num_threads,
        };

        match labels.labels().ndim() {
            2 if config.shapes => polygon_spots(&labels, &placement, &options),
            3 if config.shapes => label_meshes(&labels, &placement, &options),
            _ => Ok(region_spots(&labels, &placement)),
        }
    }
}
