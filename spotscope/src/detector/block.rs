//! LoG detection over a grid of tiles.

use common::Interval;

use super::log::LogDetector;
use super::{dedup_spots, Frame, SpotDetector};
use crate::config::BlockLogConfig;
use crate::error::Result;
use crate::spot::Spot;

pub const NAME: &str = "Block LoG detector";

/// Splits the region into `num_splits x num_splits` tiles in the xy-plane,
/// runs a LoG detector on each and merges detections of blobs that straddle
/// a tile border.
#[derive(Debug)]
pub struct BlockLogDetector {
    config: BlockLogConfig,
    inner: LogDetector,
}

impl BlockLogDetector {
    pub fn new(config: BlockLogConfig) -> Result<Self> {
        config.validate()?;
        let inner = LogDetector::new(config.blob)?;
        Ok(Self { config, inner })
    }

    pub fn config(&self) -> &BlockLogConfig {
        &self.config
    }
}

/// Boundaries splitting `[start, start + len)` into `parts` pieces whose
/// lengths differ by at most one.
fn split_axis(start: usize, len: usize, parts: usize) -> Vec<usize> {
    (0..=parts).map(|k| start + k * len / parts).collect()
}

/// Non-overlapping tiles covering `region`, keyed by tile index. Tiles
/// that would be empty are skipped. Z is never split.
pub(crate) fn tiles(region: &Interval, num_splits: usize) -> Vec<(usize, usize, Interval)> {
    let ndim = region.ndim();
    let (min, dims) = (region.min(), region.dims());
    let xs = split_axis(min[0], dims[0], num_splits);
    let ys = if ndim > 1 {
        split_axis(min[1], dims[1], num_splits)
    } else {
        vec![min[1], min[1] + 1]
    };

    let mut out = Vec::new();
    for iy in 0..ys.len() - 1 {
        for ix in 0..xs.len() - 1 {
            if xs[ix] == xs[ix + 1] || ys[iy] == ys[iy + 1] {
                continue;
            }
            let lo = [xs[ix], ys[iy], min[2]];
            let hi = [xs[ix + 1] - 1, ys[iy + 1] - 1, region.max()[2]];
            out.push((ix, iy, region.sub_interval(lo, hi)));
        }
    }
    out
}

impl SpotDetector for BlockLogDetector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn process(&self, frame: &Frame) -> Result<Vec<Spot>> {
        let mut spots = Vec::new();
        for (ix, iy, tile) in tiles(&frame.region(), self.config.num_splits) {
            let found = self
                .inner
                .detect_buffer(frame.grid.crop(&tile), tile.min(), frame.calibration)
                .map_err(|e| e.in_block(ix, iy))?;
            tracing::trace!(ix, iy, count = found.len(), "block done");
            spots.extend(found);
        }

        let removed = dedup_spots(&mut spots);
        tracing::trace!(removed, "merged block duplicates");
        Ok(spots)
    }
}
