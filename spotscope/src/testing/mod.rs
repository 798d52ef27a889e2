//! Synthetic images and helpers for tests.

#![allow(dead_code)]

use common::Grid;
use glam::DVec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::mesh::TriMesh;

/// Initialize tracing subscriber for tests.
/// Safe to call multiple times - will only initialize once.
/// Respects RUST_LOG env var, defaults to "info".
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

fn pixel_position(grid: &Grid<f32>, idx: usize) -> DVec3 {
    let [x, y, z] = grid.coords(idx);
    DVec3::new(x as f64, y as f64, z as f64)
}

/// Fills `grid` from a function of pixel position. Axes the grid lacks are 0.
pub fn fill_with(dims: &[usize], f: impl Fn(DVec3) -> f32) -> Grid<f32> {
    let mut grid = Grid::new_default(dims);
    for idx in 0..grid.len() {
        let p = pixel_position(&grid, idx);
        grid.pixels_mut()[idx] = f(p);
    }
    grid
}

/// Isotropic Gaussian blob on a flat background.
pub fn gaussian_blob(
    dims: &[usize],
    center: DVec3,
    sigma: f64,
    peak: f64,
    background: f64,
) -> Grid<f32> {
    fill_with(dims, |p| {
        let r2 = (p - center).length_squared();
        (background + peak * (-r2 / (2.0 * sigma * sigma)).exp()) as f32
    })
}

/// Gaussian blob with a different sigma per axis.
pub fn anisotropic_blob(dims: &[usize], center: DVec3, sigmas: DVec3, peak: f64) -> Grid<f32> {
    fill_with(dims, |p| {
        let d = (p - center) / sigmas;
        (peak * (-0.5 * d.length_squared()).exp()) as f32
    })
}

/// Adds `value` to every pixel within `radius` of `center`.
pub fn paint_ball(grid: &mut Grid<f32>, center: DVec3, radius: f64, value: f32) {
    for idx in 0..grid.len() {
        if pixel_position(grid, idx).distance_squared(center) <= radius * radius {
            grid.pixels_mut()[idx] = value;
        }
    }
}

/// Binary disk (2D) or ball (3D) of ones.
pub fn ball(dims: &[usize], center: DVec3, radius: f64) -> Grid<f32> {
    let mut grid = Grid::new_default(dims);
    paint_ball(&mut grid, center, radius, 1.0);
    grid
}

/// Sets every pixel in the inclusive box `[min, max]` to `value`.
pub fn paint_box(grid: &mut Grid<f32>, min: [usize; 3], max: [usize; 3], value: f32) {
    for z in min[2]..=max[2] {
        for y in min[1]..=max[1] {
            for x in min[0]..=max[0] {
                *grid.get_mut(x, y, z) = value;
            }
        }
    }
}

/// Adds uniform noise in `[-amplitude, amplitude]` from a fixed seed.
pub fn add_noise(grid: &mut Grid<f32>, amplitude: f32, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    for v in grid.pixels_mut() {
        *v += rng.random_range(-amplitude..=amplitude);
    }
}

/// Whether every directed edge of the mesh is matched by exactly one
/// opposite edge.
pub fn is_closed(mesh: &TriMesh) -> bool {
    let mut edges = hashbrown::HashMap::new();
    for &[a, b, c] in &mesh.triangles {
        for e in [(a, b), (b, c), (c, a)] {
            *edges.entry(e).or_insert(0u32) += 1;
        }
    }
    edges
        .iter()
        .all(|(&(a, b), &n)| n == 1 && edges.get(&(b, a)) == Some(&1))
}
