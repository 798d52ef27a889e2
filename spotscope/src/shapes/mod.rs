//! Turning segmented regions into spots: plain centroid/radius reduction,
//! traced 2D outlines and 3D surface meshes.
//!
//! Every function works on a zero-based working buffer and a [`Placement`]
//! telling where that buffer sits in the source image.


use std::f64::consts::PI;

use common::parallel::with_thread_budget;
use common::{BitGrid, Grid, MAX_DIMS};
use glam::{DVec2, DVec3};

use crate::contour::trace_outlines;
use crate::error::Result;
use crate::filter::blur_axes;
use crate::kernel::gaussian_half_width;
use crate::mesh::{self, decimate, marching_cubes, target_ratio, TriMesh};
use crate::segment::{LabelMap, LabelRegion};
use crate::simplify::{contains_point, polygon_centroid, signed_area, simplify_polygon};
use crate::spot::{Calibration, Spot, SpotShape};

/// Meshes enclosing fewer voxels than this are dropped.
pub const MIN_MESH_VOLUME: f64 = 15.0;

/// Precision, in decimal places of a pixel, at which mesh vertices are merged.
const MESH_DEDUP_DECIMALS: i32 = 2;

/// Position of a working buffer inside the source image.
#[derive(Debug, Clone, Copy)]
pub struct Placement<'a> {
    /// Source pixel of the buffer's first element.
    pub origin: [usize; MAX_DIMS],
    pub calibration: Calibration,
    /// Quality image cropped like the working buffer.
    pub quality: Option<&'a Grid<f32>>,
}

impl Placement<'_> {
    /// Physical coordinate of a position in working-buffer pixels.
    #[inline]
    pub fn to_physical(&self, local: DVec3) -> DVec3 {
        let origin = DVec3::new(
            self.origin[0] as f64,
            self.origin[1] as f64,
            self.origin[2] as f64,
        );
        self.calibration.to_physical(origin + local)
    }
}

/// Shape extraction settings shared by the segmentation detectors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeOptions {
    /// Resample and simplify outlines, decimate meshes.
    pub simplify: bool,
    /// Physical scale of the per-object Gaussian smoothing; 0 disables it.
    pub smoothing_scale: f64,
    pub num_threads: usize,
}

/// Radius of the disk (2D) or ball (3D) with the given area or volume. In
/// 1D the measure is a length and the radius is half of it.
pub fn equivalent_radius(measure: f64, ndim: usize) -> f64 {
    match ndim {
        1 => measure / 2.0,
        2 => (measure / PI).sqrt(),
        _ => (3.0 * measure / (4.0 * PI)).cbrt(),
    }
}

/// Largest value among `pixels` of the quality image, if any.
fn max_over(quality: &Grid<f32>, pixels: impl Iterator<Item = [usize; MAX_DIMS]>) -> Option<f64> {
    pixels
        .map(|[x, y, z]| *quality.get(x, y, z) as f64)
        .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
}

// ============================================================================
// Region reduction
// ============================================================================

/// One spot per label: centroid of the member pixels and the radius of the
/// disk or ball of equal physical size.
///
/// Quality is the pixel count, or the maximum of the quality image over the
/// member pixels.
pub fn region_spots(labels: &LabelMap, placement: &Placement) -> Vec<Spot> {
    let ndim = labels.labels().ndim();
    let cell = placement.calibration.cell_volume(ndim);
    labels
        .regions()
        .iter()
        .map(|region| {
            let quality = match placement.quality {
                Some(q) => max_over(q, region_pixels(labels, region)).unwrap_or(0.0),
                None => region.count as f64,
            };
            Spot::new(
                placement.to_physical(region.centroid()),
                equivalent_radius(region.count as f64 * cell, ndim),
                quality,
            )
        })
        .collect()
}

fn region_pixels<'a>(
    labels: &'a LabelMap,
    region: &'a LabelRegion,
) -> impl Iterator<Item = [usize; MAX_DIMS]> + 'a {
    let grid = labels.labels();
    (region.min[2]..=region.max[2]).flat_map(move |z| {
        (region.min[1]..=region.max[1]).flat_map(move |y| {
            (region.min[0]..=region.max[0])
                .filter(move |&x| *grid.get(x, y, z) == region.label)
                .map(move |x| [x, y, z])
        })
    })
}

// ============================================================================
// Smoothing
// ============================================================================

/// Blurs a binary mask after zero-padding it by each axis' kernel half-width,
/// so the blurred object is not clipped by the crop. Returns the blurred
/// grid and the padding per axis.
///
/// Runs on the current pool; callers hold one budget for all regions.
fn padded_blur(mask: &BitGrid, sigmas: [f64; MAX_DIMS]) -> (Grid<f32>, [usize; MAX_DIMS]) {
    let ndim = mask.ndim();
    let dims = mask.dims();
    let mut pad = [0usize; MAX_DIMS];
    let mut padded_dims = dims;
    for d in 0..ndim {
        if sigmas[d] > 0.0 {
            pad[d] = gaussian_half_width(sigmas[d]);
        }
        padded_dims[d] = dims[d] + 2 * pad[d];
    }

    let mut padded = Grid::new_default(&padded_dims[..ndim]);
    for z in 0..dims[2] {
        for y in 0..dims[1] {
            for x in 0..dims[0] {
                if mask.get(x, y, z) {
                    *padded.get_mut(x + pad[0], y + pad[1], z + pad[2]) = 1.0;
                }
            }
        }
    }
    (blur_axes(&padded, sigmas), pad)
}

/// Runs `op` inside one pool of `options.num_threads` when smoothing is on;
/// without smoothing nothing runs in parallel and no pool is built.
fn with_smoothing_budget<F>(options: &ShapeOptions, op: F) -> Result<Vec<Spot>>
where
    F: FnOnce() -> Vec<Spot> + Send,
{
    if options.smoothing_scale > 0.0 {
        Ok(with_thread_budget(options.num_threads, op)?)
    } else {
        Ok(op())
    }
}

/// Per-axis smoothing sigma in pixels for a physical `scale`.
fn smoothing_sigmas(scale: f64, ndim: usize, calibration: &Calibration) -> [f64; MAX_DIMS] {
    let mut sigmas = [0.0; MAX_DIMS];
    for (d, sigma) in sigmas.iter_mut().enumerate().take(ndim) {
        *sigma = scale / (ndim as f64).sqrt() / calibration.axis(d);
    }
    sigmas
}

// ============================================================================
// 2D outlines
// ============================================================================

/// One spot per traced outline of every label of a 2D label map.
///
/// Each region is cropped to its bounding box, optionally smoothed and
/// re-binarized, traced, and optionally simplified. Outlines that end up
/// with fewer than 3 vertices or no area are dropped. Vertices are reported
/// in pixel-center coordinates scaled to physical units, so a pixel's outline
/// runs half a pixel around its center.
pub fn polygon_spots(
    labels: &LabelMap,
    placement: &Placement,
    options: &ShapeOptions,
) -> Result<Vec<Spot>> {
    let trace_all = || {
        let mut spots = Vec::new();
        for region in labels.regions() {
            let mut mask = labels.region_mask(&region);
            let mut offset = DVec2::new(region.min[0] as f64, region.min[1] as f64);

            if options.smoothing_scale > 0.0 {
                let sigmas = smoothing_sigmas(options.smoothing_scale, 2, &placement.calibration);
                let (blurred, pad) = padded_blur(&mask, sigmas);
                mask = BitGrid::from_grid(&blurred, |&v| v > 0.5);
                offset -= DVec2::new(pad[0] as f64, pad[1] as f64);
            }

            for outline in trace_outlines(&mask) {
                let corners: Vec<DVec2> = outline.iter().map(|p| p.as_dvec2()).collect();
                let points = if options.simplify {
                    simplify_polygon(&corners)
                } else {
                    corners
                };
                if let Some(spot) = polygon_to_spot(points, offset, placement) {
                    spots.push(spot);
                }
            }
        }
        spots
    };
    with_smoothing_budget(options, trace_all)
}

/// Builds a spot from outline corners in mask coordinates, or `None` for a
/// degenerate outline.
fn polygon_to_spot(points: Vec<DVec2>, offset: DVec2, placement: &Placement) -> Option<Spot> {
    if points.len() < 3 {
        return None;
    }
    let area = signed_area(&points);
    if area == 0.0 || !area.is_finite() {
        return None;
    }

    // Working-buffer pixel-center frame, counter-clockwise.
    let shift = offset - DVec2::splat(0.5);
    let mut local: Vec<DVec2> = points.iter().map(|&p| p + shift).collect();
    if area < 0.0 {
        local.reverse();
    }
    let area = area.abs();

    let quality = match placement.quality {
        Some(q) => polygon_quality(q, &local),
        None => area,
    };

    let cal = placement.calibration;
    let physical_area = area * cal.axis(0) * cal.axis(1);
    let centroid = polygon_centroid(&local);
    let vertices = local
        .iter()
        .map(|p| placement.to_physical(p.extend(0.0)).truncate())
        .collect();

    Some(
        Spot::new(
            placement.to_physical(centroid.extend(0.0)),
            equivalent_radius(physical_area, 2),
            quality,
        )
        .with_shape(SpotShape::Polygon(vertices)),
    )
}

/// Maximum of the quality image over the pixel centers inside `polygon`.
/// Outlines too thin to contain a pixel center fall back to the pixel under
/// their centroid.
fn polygon_quality(quality: &Grid<f32>, polygon: &[DVec2]) -> f64 {
    let [w, h, _] = quality.dims();
    let (lo, hi) = polygon.iter().fold(
        (DVec2::splat(f64::INFINITY), DVec2::splat(f64::NEG_INFINITY)),
        |(lo, hi), &p| (lo.min(p), hi.max(p)),
    );
    let x0 = lo.x.ceil().max(0.0) as usize;
    let y0 = lo.y.ceil().max(0.0) as usize;
    let x1 = (hi.x.floor().max(-1.0) + 1.0).min(w as f64) as usize;
    let y1 = (hi.y.floor().max(-1.0) + 1.0).min(h as f64) as usize;

    let inside = (y0..y1).flat_map(|y| {
        (x0..x1)
            .filter(move |&x| contains_point(polygon, DVec2::new(x as f64, y as f64)))
            .map(move |x| [x, y, 0])
    });
    max_over(quality, inside).unwrap_or_else(|| {
        let c = polygon_centroid(polygon).round();
        let x = (c.x.max(0.0) as usize).min(w.saturating_sub(1));
        let y = (c.y.max(0.0) as usize).min(h.saturating_sub(1));
        *quality.get(x, y, 0) as f64
    })
}

// ============================================================================
// 3D meshes
// ============================================================================

/// Meshes the iso-surface of a grayscale volume at `threshold`.
///
/// The surface is split into connected pieces and cavity shells are folded
/// into the object around them before each piece becomes a spot.
pub fn threshold_meshes(
    volume: &Grid<f32>,
    threshold: f64,
    placement: &Placement,
    options: &ShapeOptions,
) -> Vec<Spot> {
    let surface = mesh::dedup_vertices(&marching_cubes(volume, threshold), MESH_DEDUP_DECIMALS);
    let pieces = mesh::merge_contained(mesh::connected_components(&surface));
    tracing::trace!(pieces = pieces.len(), "threshold meshes");
    pieces
        .into_iter()
        .filter_map(|piece| mesh_to_spot(piece, DVec3::ZERO, placement, options))
        .collect()
}

/// One mesh per label of a 3D label map, extracted at 0.5 from the region's
/// binary mask or from its smoothed version.
pub fn label_meshes(
    labels: &LabelMap,
    placement: &Placement,
    options: &ShapeOptions,
) -> Result<Vec<Spot>> {
    let mesh_all = || {
        let mut spots = Vec::new();
        for region in labels.regions() {
            let mask = labels.region_mask(&region);
            let mut offset = DVec3::new(
                region.min[0] as f64,
                region.min[1] as f64,
                region.min[2] as f64,
            );

            let volume = if options.smoothing_scale > 0.0 {
                let sigmas = smoothing_sigmas(options.smoothing_scale, 3, &placement.calibration);
                let (blurred, pad) = padded_blur(&mask, sigmas);
                offset -= DVec3::new(pad[0] as f64, pad[1] as f64, pad[2] as f64);
                blurred
            } else {
                mask.to_grid()
            };

            let surface =
                mesh::dedup_vertices(&marching_cubes(&volume, 0.5), MESH_DEDUP_DECIMALS);
            if let Some(spot) = mesh_to_spot(surface, offset, placement, options) {
                spots.push(spot);
            }
        }
        spots
    };
    with_smoothing_budget(options, mesh_all)
}

/// Turns a mesh in region coordinates into a spot, or `None` when it
/// encloses less than [`MIN_MESH_VOLUME`] voxels.
///
/// `offset` moves the mesh into working-buffer pixels.
pub fn mesh_to_spot(
    mut mesh: TriMesh,
    offset: DVec3,
    placement: &Placement,
    options: &ShapeOptions,
) -> Option<Spot> {
    if options.simplify {
        if let Some(ratio) = target_ratio(mesh.num_triangles()) {
            mesh = decimate(&mesh, ratio, mesh::decimate::DEFAULT_AGGRESSIVENESS);
        }
    }

    let voxels = mesh.signed_volume();
    if voxels.is_nan() || voxels < MIN_MESH_VOLUME {
        return None;
    }

    mesh.translate_scale(offset, DVec3::ONE);
    let quality = placement.quality.map(|q| mesh_quality(q, &mesh));

    let cal = placement.calibration;
    let origin = DVec3::new(
        placement.origin[0] as f64,
        placement.origin[1] as f64,
        placement.origin[2] as f64,
    );
    mesh.translate_scale(origin, DVec3::from(cal.0));

    let volume = voxels * cal.cell_volume(3);
    Some(
        Spot::new(
            mesh.centroid(),
            equivalent_radius(volume, 3),
            quality.unwrap_or(volume),
        )
        .with_shape(SpotShape::Mesh(mesh)),
    )
}

/// Maximum of the quality image over the voxel centers inside `mesh`, with
/// the same centroid fallback as outlines.
fn mesh_quality(quality: &Grid<f32>, mesh: &TriMesh) -> f64 {
    let dims = quality.dims();
    let (lo, hi) = mesh.bounding_box();
    let range = |d: usize| {
        let start = lo[d].ceil().max(0.0) as usize;
        let end = (hi[d].floor().max(-1.0) + 1.0).min(dims[d] as f64) as usize;
        start..end
    };

    let (rx, ry, rz) = (range(0), range(1), range(2));
    let inside = rz.flat_map(|z| {
        let rx = rx.clone();
        ry.clone().flat_map(move |y| {
            rx.clone()
                .filter(move |&x| mesh.contains_point(DVec3::new(x as f64, y as f64, z as f64)))
                .map(move |x| [x, y, z])
        })
    });
    max_over(quality, inside).unwrap_or_else(|| {
        let c = mesh.centroid().round();
        let p = [0, 1, 2].map(|d| (c[d].max(0.0) as usize).min(dims[d].saturating_sub(1)));
        *quality.get(p[0], p[1], p[2]) as f64
    })
}
