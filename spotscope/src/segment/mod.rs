//! Thresholding and connected-component segmentation.

pub mod labeling;


use common::{BitGrid, Grid};

pub use labeling::{label_components, LabelMap, LabelRegion};

/// Number of histogram bins used by [`otsu_threshold`].
const OTSU_BINS: usize = 256;

/// Binary mask of the pixels strictly above `threshold`.
pub fn threshold_mask(grid: &Grid<f32>, threshold: f64) -> BitGrid {
    BitGrid::from_grid(grid, |&v| v as f64 > threshold)
}

/// Otsu threshold over a 256-bin histogram spanning the observed range.
///
/// Values map to bins by `floor((v - min) / (max - min) * 256)`, with the
/// maximum folded into the last bin, and the result is the center value of
/// the chosen bin. The search skips the first and last bin; ties go to the
/// higher bin. A constant input returns its value.
pub fn otsu_threshold(values: &[f32]) -> f64 {
    let (min, max) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v as f64), hi.max(v as f64))
        });
    if !min.is_finite() || !max.is_finite() {
        return 0.0;
    }
    if max <= min {
        return min;
    }

    let bins = OTSU_BINS as f64;
    let mut histogram = [0u64; OTSU_BINS];
    for &v in values.iter().filter(|v| !v.is_nan()) {
        let bin = ((v as f64 - min) / (max - min) * bins) as usize;
        histogram[bin.min(OTSU_BINS - 1)] += 1;
    }

    let k = otsu_bin(&histogram);
    let threshold = min + (k as f64 + 0.5) * (max - min) / bins;
    tracing::debug!(bin = k, threshold, "otsu threshold");
    threshold
}

/// Bin maximizing the between-class variance.
fn otsu_bin(histogram: &[u64]) -> usize {
    let n: u64 = histogram.iter().sum();
    let s: f64 = histogram
        .iter()
        .enumerate()
        .map(|(k, &c)| k as f64 * c as f64)
        .sum();

    let mut sk = 0.0f64;
    let mut n1 = histogram[0];
    let mut best = 0.0f64;
    let mut k_star = 0;

    for (k, &count) in histogram.iter().enumerate().take(histogram.len() - 1).skip(1) {
        sk += k as f64 * count as f64;
        n1 += count;

        let denom = n1 as f64 * (n - n1) as f64;
        let bcv = if denom != 0.0 {
            let num = (n1 as f64 / n as f64) * s - sk;
            num * num / denom
        } else {
            0.0
        };

        if bcv >= best {
            best = bcv;
            k_star = k;
        }
    }
    k_star
}
