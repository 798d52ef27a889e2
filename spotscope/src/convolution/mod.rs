//! FFT-based convolution with a dense kernel.
//!
//! The input is mirror-extended into a buffer of `size + kernel - 1` samples
//! per axis, so the circular convolution computed in the frequency domain
//! contains the full linear convolution without wrap-around.


use std::sync::Arc;

use common::parallel::with_thread_budget;
use common::{Grid, MAX_DIMS};
use rayon::prelude::*;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::error::Result;
use crate::filter::mirror_index;
use crate::kernel::Kernel;

/// Responses smaller than this fraction of the largest magnitude are FFT
/// round-off and are set to zero.
const ROUNDOFF_FLOOR: f64 = 1e-10;

/// Convolves `input` with `kernel`, returning a grid of the input's extent.
///
/// Kernel axes beyond the input's dimensionality must have extent 1.
pub fn fft_convolve(input: &Grid<f32>, kernel: &Kernel, num_threads: usize) -> Result<Grid<f32>> {
    let dims = input.dims();
    let kdims = kernel.dims();
    let center = kernel.center();
    for d in input.ndim()..MAX_DIMS {
        assert_eq!(kdims[d], 1, "kernel has more axes than the input");
    }

    let mut padded = [1usize; MAX_DIMS];
    for d in 0..MAX_DIMS {
        padded[d] = dims[d] + kdims[d] - 1;
    }

    let output = with_thread_budget(num_threads, || {
        let mut planner = FftPlanner::<f64>::new();
        let forward: [Arc<dyn Fft<f64>>; MAX_DIMS] =
            padded.map(|len| planner.plan_fft_forward(len));
        let inverse: [Arc<dyn Fft<f64>>; MAX_DIMS] =
            padded.map(|len| planner.plan_fft_inverse(len));

        let mut signal = extend_mirrored(input, padded, center);
        let mut response = wrap_kernel(kernel, padded);

        for axis in 0..MAX_DIMS {
            fft_axis(&mut signal, padded, axis, &forward[axis]);
            fft_axis(&mut response, padded, axis, &forward[axis]);
        }

        signal
            .par_iter_mut()
            .zip(response.par_iter())
            .for_each(|(s, r)| *s = *s * *r);

        for axis in 0..MAX_DIMS {
            fft_axis(&mut signal, padded, axis, &inverse[axis]);
        }

        crop_center(&signal, input, padded, center)
    })?;

    Ok(output)
}

/// Places the input so that padded sample `q` holds `input[mirror(q - center)]`.
fn extend_mirrored(
    input: &Grid<f32>,
    padded: [usize; MAX_DIMS],
    center: [usize; MAX_DIMS],
) -> Vec<Complex<f64>> {
    let dims = input.dims();
    let mut buffer = vec![Complex::new(0.0, 0.0); padded.iter().product()];
    buffer
        .par_chunks_mut(padded[0])
        .enumerate()
        .for_each(|(row, line)| {
            let qy = row % padded[1];
            let qz = row / padded[1];
            let sy = mirror_index(qy as isize - center[1] as isize, dims[1]);
            let sz = mirror_index(qz as isize - center[2] as isize, dims[2]);
            for (qx, v) in line.iter_mut().enumerate() {
                let sx = mirror_index(qx as isize - center[0] as isize, dims[0]);
                *v = Complex::new(*input.get(sx, sy, sz) as f64, 0.0);
            }
        });
    buffer
}

/// Circularly shifts the kernel so its center lands on index zero.
fn wrap_kernel(kernel: &Kernel, padded: [usize; MAX_DIMS]) -> Vec<Complex<f64>> {
    let weights = kernel.weights();
    let [kx, ky, kz] = kernel.dims();
    let center = kernel.center();
    let mut buffer = vec![Complex::new(0.0, 0.0); padded.iter().product()];
    for z in 0..kz {
        let wz = (z + padded[2] - center[2]) % padded[2];
        for y in 0..ky {
            let wy = (y + padded[1] - center[1]) % padded[1];
            for x in 0..kx {
                let wx = (x + padded[0] - center[0]) % padded[0];
                buffer[(wz * padded[1] + wy) * padded[0] + wx] =
                    Complex::new(*weights.get(x, y, z), 0.0);
            }
        }
    }
    buffer
}

/// In-place 1D transform of every line along `axis`.
fn fft_axis(
    data: &mut [Complex<f64>],
    dims: [usize; MAX_DIMS],
    axis: usize,
    fft: &Arc<dyn Fft<f64>>,
) {
    let len = dims[axis];
    if len == 1 {
        return;
    }

    if axis == 0 {
        data.par_chunks_mut(len).for_each_init(
            || vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()],
            |scratch, line| fft.process_with_scratch(line, scratch),
        );
        return;
    }

    let stride: usize = dims[..axis].iter().product();
    let block = stride * len;
    let starts: Vec<usize> = (0..data.len() / block)
        .flat_map(|b| (0..stride).map(move |i| b * block + i))
        .collect();

    let lines: Vec<Vec<Complex<f64>>> = {
        let src: &[Complex<f64>] = &*data;
        starts
            .par_iter()
            .map(|&start| {
                let mut line: Vec<Complex<f64>> = (0..len).map(|k| src[start + k * stride]).collect();
                fft.process(&mut line);
                line
            })
            .collect()
    };

    for (&start, line) in starts.iter().zip(lines) {
        for (k, v) in line.into_iter().enumerate() {
            data[start + k * stride] = v;
        }
    }
}

fn crop_center(
    signal: &[Complex<f64>],
    input: &Grid<f32>,
    padded: [usize; MAX_DIMS],
    center: [usize; MAX_DIMS],
) -> Grid<f32> {
    let dims = input.dims();
    let scale = 1.0 / signal.len() as f64;

    let mut values = Vec::with_capacity(input.len());
    for z in 0..dims[2] {
        for y in 0..dims[1] {
            let row = ((z + center[2]) * padded[1] + y + center[1]) * padded[0] + center[0];
            values.extend(signal[row..row + dims[0]].iter().map(|c| c.re * scale));
        }
    }

    let peak = values.iter().fold(0.0f64, |m, v| m.max(v.abs()));
    let floor = peak * ROUNDOFF_FLOOR;
    let pixels = values
        .into_iter()
        .map(|v| if v.abs() < floor { 0.0 } else { v as f32 })
        .collect();
    Grid::new(&dims[..input.ndim()], pixels)
}
