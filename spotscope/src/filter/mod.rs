//! Image pre-conditioning filters: 3x3 median, separable Gaussian blur and
//! box-average downsampling.
//!
//! Borders use mirror-single extension (the edge pixel is not repeated).


use common::parallel::with_thread_budget;
use common::{Grid, MAX_DIMS};
use rayon::prelude::*;

use crate::error::Result;
use crate::kernel::gaussian_kernel_1d;

/// Reflects `i` into `[0, len)` without repeating the edge sample.
#[inline]
pub(crate) fn mirror_index(i: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let m = i.rem_euclid(period);
    if m < len as isize {
        m as usize
    } else {
        (period - m) as usize
    }
}

// ============================================================================
// Median filter
// ============================================================================

/// 3x3 median filter applied independently to every xy-plane.
///
/// Border pixels use the in-bounds part of their neighbourhood; even-sized
/// neighbourhoods average the two middle values.
pub fn median_filter_3x3(grid: &Grid<f32>, num_threads: usize) -> Result<Grid<f32>> {
    let [w, h, _] = grid.dims();
    let mut output = grid.clone();
    if grid.ndim() < 2 {
        return Ok(output);
    }

    with_thread_budget(num_threads, || {
        output
            .pixels_mut()
            .par_chunks_mut(w)
            .enumerate()
            .for_each(|(row, out_row)| {
                let y = row % h;
                let plane = grid.plane(row / h);
                for (x, out) in out_row.iter_mut().enumerate() {
                    *out = median_at(plane, w, h, x, y);
                }
            });
    })?;

    Ok(output)
}

#[inline]
fn median_at(plane: &[f32], width: usize, height: usize, x: usize, y: usize) -> f32 {
    let mut neighbors = [0.0f32; 9];
    let mut count = 0;
    for ny in y.saturating_sub(1)..(y + 2).min(height) {
        for nx in x.saturating_sub(1)..(x + 2).min(width) {
            neighbors[count] = plane[ny * width + nx];
            count += 1;
        }
    }
    median_of_n(&mut neighbors[..count])
}

/// Median of a small slice; averages the middle pair for even lengths.
pub(crate) fn median_of_n(values: &mut [f32]) -> f32 {
    let n = values.len();
    match n {
        0 => 0.0,
        1 => values[0],
        _ => {
            values.sort_unstable_by(f32::total_cmp);
            if n % 2 == 1 {
                values[n / 2]
            } else {
                (values[n / 2 - 1] + values[n / 2]) * 0.5
            }
        }
    }
}

// ============================================================================
// Gaussian blur
// ============================================================================

/// Separable Gaussian blur with per-axis sigmas in pixels.
///
/// Axes with a non-positive sigma, and axes beyond the grid's dimensionality,
/// are left untouched.
pub fn gaussian_blur(
    grid: &Grid<f32>,
    sigmas: [f64; MAX_DIMS],
    num_threads: usize,
) -> Result<Grid<f32>> {
    with_thread_budget(num_threads, || blur_axes(grid, sigmas)).map_err(Into::into)
}

/// [`gaussian_blur`] on the current pool.
pub(crate) fn blur_axes(grid: &Grid<f32>, sigmas: [f64; MAX_DIMS]) -> Grid<f32> {
    let mut current = grid.clone();
    for (axis, &sigma) in sigmas.iter().enumerate().take(grid.ndim()) {
        if sigma > 0.0 {
            let kernel = gaussian_kernel_1d(sigma);
            current = convolve_axis(&current, &kernel, axis);
        }
    }
    current
}

/// Convolves every line along `axis` with a symmetric 1D kernel.
///
/// Must be called inside a thread pool; parallel over output rows.
pub(crate) fn convolve_axis(input: &Grid<f32>, kernel: &[f64], axis: usize) -> Grid<f32> {
    let [w, h, _] = input.dims();
    let extent = input.dims()[axis];
    let stride = input.strides()[axis];
    let radius = kernel.len() / 2;
    let src = input.pixels();

    let mut output = input.clone();
    output
        .pixels_mut()
        .par_chunks_mut(w)
        .enumerate()
        .for_each(|(row, out_row)| {
            let coords = [0, row % h, row / h];
            let row_base = row * w;
            for (x, out) in out_row.iter_mut().enumerate() {
                let pos = if axis == 0 { x } else { coords[axis] };
                let line_origin = row_base + x - pos * stride;
                let mut sum = 0.0f64;
                for (k, &kv) in kernel.iter().enumerate() {
                    let s = mirror_index(pos as isize + k as isize - radius as isize, extent);
                    sum += src[line_origin + s * stride] as f64 * kv;
                }
                *out = sum as f32;
            }
        });
    output
}

// ============================================================================
// Downsampling
// ============================================================================

/// Averages non-overlapping boxes of `factors` pixels.
///
/// Output extent is `ceil(extent / factor)` per axis; boxes cut by the grid
/// border average only their in-bounds pixels.
pub fn box_downsample(grid: &Grid<f32>, factors: [usize; MAX_DIMS]) -> Grid<f32> {
    let ndim = grid.ndim();
    let dims = grid.dims();
    let mut out_dims = [1usize; MAX_DIMS];
    for d in 0..ndim {
        assert!(factors[d] > 0, "downsample factor must be positive");
        out_dims[d] = dims[d].div_ceil(factors[d]);
    }

    let mut sums = vec![0.0f64; out_dims.iter().product()];
    let mut counts = vec![0u32; sums.len()];
    for z in 0..dims[2] {
        let oz = if ndim > 2 { z / factors[2] } else { 0 };
        for y in 0..dims[1] {
            let oy = if ndim > 1 { y / factors[1] } else { 0 };
            for x in 0..dims[0] {
                let ox = x / factors[0];
                let idx = (oz * out_dims[1] + oy) * out_dims[0] + ox;
                sums[idx] += *grid.get(x, y, z) as f64;
                counts[idx] += 1;
            }
        }
    }

    let pixels = sums
        .iter()
        .zip(&counts)
        .map(|(&s, &c)| (s / c as f64) as f32)
        .collect();
    Grid::new(&out_dims[..ndim], pixels)
}
