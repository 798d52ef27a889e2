//! Strict local maxima with optional quadratic sub-pixel refinement.

#[cfg(test)]
mod tests;

use arrayvec::ArrayVec;
use common::parallel::with_thread_budget;
use common::{Grid, MAX_DIMS};
use glam::{DMat2, DMat3, DVec2, DVec3};
use rayon::prelude::*;

use crate::error::Result;
use crate::filter::mirror_index;
use crate::spot::{Calibration, Spot};

/// Maximum number of whole-pixel moves during sub-pixel refinement.
const MAX_REFINE_MOVES: usize = 10;

/// Parameters of a maxima search over a zero-based working buffer.
#[derive(Debug, Clone, Copy)]
pub struct PeakSearch {
    /// Values must be strictly above this to count.
    pub threshold: f64,
    /// Radius assigned to every resulting spot, in physical units.
    pub radius: f64,
    pub calibration: Calibration,
    /// Pixel offset of the buffer inside the source image.
    pub origin: [usize; MAX_DIMS],
    pub subpixel: bool,
}

/// Finds strict local maxima of `source` over the full 3^n - 1 neighbourhood.
///
/// The border is extended by mirroring, so edge pixels compete only against
/// in-bounds values. Spots come back in raster order regardless of the
/// thread count.
pub fn find_local_maxima(
    source: &Grid<f32>,
    search: &PeakSearch,
    num_threads: usize,
) -> Result<Vec<Spot>> {
    let offsets = neighbor_offsets(source.ndim());
    let offsets = offsets.as_slice();
    let [w, h, d] = source.dims();

    let spots = with_thread_budget(num_threads, || {
        (0..h * d)
            .into_par_iter()
            .flat_map_iter(|row| {
                let (y, z) = (row % h, row / h);
                (0..w).filter_map(move |x| {
                    let p = [x, y, z];
                    is_strict_maximum(source, p, search.threshold, offsets)
                        .then(|| peak_to_spot(source, p, search))
                })
            })
            .collect::<Vec<_>>()
    })?;

    tracing::trace!(count = spots.len(), "local maxima");
    Ok(spots)
}

pub(crate) fn neighbor_offsets(ndim: usize) -> ArrayVec<[isize; MAX_DIMS], 26> {
    let range = |d: usize| if d < ndim { -1..=1 } else { 0..=0 };
    let mut offsets = ArrayVec::new();
    for dz in range(2) {
        for dy in range(1) {
            for dx in range(0) {
                if (dx, dy, dz) != (0, 0, 0) {
                    offsets.push([dx, dy, dz]);
                }
            }
        }
    }
    offsets
}

#[inline]
fn mirrored(source: &Grid<f32>, p: [isize; MAX_DIMS]) -> f64 {
    let dims = source.dims();
    *source.get(
        mirror_index(p[0], dims[0]),
        mirror_index(p[1], dims[1]),
        mirror_index(p[2], dims[2]),
    ) as f64
}

fn is_strict_maximum(
    source: &Grid<f32>,
    p: [usize; MAX_DIMS],
    threshold: f64,
    offsets: &[[isize; MAX_DIMS]],
) -> bool {
    let center = *source.get(p[0], p[1], p[2]) as f64;
    if center <= threshold {
        return false;
    }
    let p = p.map(|v| v as isize);
    offsets
        .iter()
        .all(|o| mirrored(source, [p[0] + o[0], p[1] + o[1], p[2] + o[2]]) < center)
}

fn peak_to_spot(source: &Grid<f32>, p: [usize; MAX_DIMS], search: &PeakSearch) -> Spot {
    let quality = *source.get(p[0], p[1], p[2]) as f64;
    let local = if search.subpixel {
        refine(source, p)
    } else {
        DVec3::new(p[0] as f64, p[1] as f64, p[2] as f64)
    };
    let origin = DVec3::new(
        search.origin[0] as f64,
        search.origin[1] as f64,
        search.origin[2] as f64,
    );
    Spot::new(
        search.calibration.to_physical(origin + local),
        search.radius,
        quality,
    )
}

// ============================================================================
// Sub-pixel refinement
// ============================================================================

/// Second-order Taylor refinement around an integer maximum.
///
/// When the fitted optimum lies more than half a pixel away, the integer
/// position moves one pixel towards it and the fit is repeated, up to
/// [`MAX_REFINE_MOVES`] times. If it still has not settled, the offset is
/// clamped to the current pixel.
pub(crate) fn refine(source: &Grid<f32>, peak: [usize; MAX_DIMS]) -> DVec3 {
    let ndim = source.ndim();
    let dims = source.dims();
    let mut pos = peak;

    for moves in 0..=MAX_REFINE_MOVES {
        let as_vec = DVec3::new(pos[0] as f64, pos[1] as f64, pos[2] as f64);
        let Some(offset) = quadratic_offset(source, pos, ndim) else {
            return as_vec;
        };

        let mut next = pos;
        for d in 0..ndim {
            if offset[d] > 0.5 && pos[d] + 1 < dims[d] {
                next[d] += 1;
            } else if offset[d] < -0.5 && pos[d] > 0 {
                next[d] -= 1;
            }
        }

        if next == pos || moves == MAX_REFINE_MOVES {
            return as_vec + offset.clamp(DVec3::splat(-0.5), DVec3::splat(0.5));
        }
        pos = next;
    }

    DVec3::new(pos[0] as f64, pos[1] as f64, pos[2] as f64)
}

/// Solves `H * offset = -g` from central finite differences.
fn quadratic_offset(source: &Grid<f32>, pos: [usize; MAX_DIMS], ndim: usize) -> Option<DVec3> {
    let p = pos.map(|v| v as isize);
    let at = |dx: isize, dy: isize, dz: isize| mirrored(source, [p[0] + dx, p[1] + dy, p[2] + dz]);
    let unit = |d: usize| {
        let mut o = [0isize; MAX_DIMS];
        o[d] = 1;
        o
    };

    let center = at(0, 0, 0);
    let mut g = [0.0f64; MAX_DIMS];
    let mut hm = [[0.0f64; MAX_DIMS]; MAX_DIMS];
    for d in 0..ndim {
        let [ax, ay, az] = unit(d);
        let forward = at(ax, ay, az);
        let backward = at(-ax, -ay, -az);
        g[d] = (forward - backward) * 0.5;
        hm[d][d] = forward - 2.0 * center + backward;
        for e in d + 1..ndim {
            let [bx, by, bz] = unit(e);
            let v = (at(ax + bx, ay + by, az + bz) - at(ax - bx, ay - by, az - bz)
                - at(-ax + bx, -ay + by, -az + bz)
                + at(-ax - bx, -ay - by, -az - bz))
                * 0.25;
            hm[d][e] = v;
            hm[e][d] = v;
        }
    }

    let offset = match ndim {
        1 => {
            if hm[0][0] == 0.0 {
                return None;
            }
            DVec3::new(-g[0] / hm[0][0], 0.0, 0.0)
        }
        2 => {
            let m = DMat2::from_cols_array_2d(&[[hm[0][0], hm[0][1]], [hm[1][0], hm[1][1]]]);
            if m.determinant().abs() < f64::EPSILON {
                return None;
            }
            let o = -(m.inverse() * DVec2::new(g[0], g[1]));
            DVec3::new(o.x, o.y, 0.0)
        }
        _ => {
            let m = DMat3::from_cols_array_2d(&hm);
            if m.determinant().abs() < f64::EPSILON {
                return None;
            }
            -(m.inverse() * DVec3::from(g))
        }
    };

    offset.is_finite().then_some(offset)
}
