use super::*;

fn search(threshold: f64, subpixel: bool) -> PeakSearch {
    PeakSearch {
        threshold,
        radius: 2.0,
        calibration: Calibration::default(),
        origin: [0; MAX_DIMS],
        subpixel,
    }
}

fn gaussian_2d(w: usize, h: usize, cx: f64, cy: f64, sigma: f64) -> Grid<f32> {
    let mut grid = Grid::new_default(&[w, h]);
    for y in 0..h {
        for x in 0..w {
            let r2 = (x as f64 - cx).powi(2) + (y as f64 - cy).powi(2);
            *grid.get_mut(x, y, 0) = (100.0 * (-r2 / (2.0 * sigma * sigma)).exp()) as f32;
        }
    }
    grid
}

#[test]
fn test_neighbor_offsets_count() {
    assert_eq!(neighbor_offsets(1).len(), 2);
    assert_eq!(neighbor_offsets(2).len(), 8);
    assert_eq!(neighbor_offsets(3).len(), 26);
}

#[test]
fn test_single_peak_found() {
    let grid = gaussian_2d(15, 15, 7.0, 5.0, 2.0);
    let spots = find_local_maxima(&grid, &search(0.0, false), 1).unwrap();
    assert_eq!(spots.len(), 1);
    assert_eq!(spots[0].position, DVec3::new(7.0, 5.0, 0.0));
    assert!((spots[0].quality - 100.0).abs() < 1e-4);
    assert_eq!(spots[0].radius, 2.0);
}

#[test]
fn test_plateau_is_not_strict_maximum() {
    let mut grid = Grid::new_default(&[6, 6]);
    *grid.get_mut(2, 2, 0) = 5.0;
    *grid.get_mut(3, 2, 0) = 5.0;
    let spots = find_local_maxima(&grid, &search(0.0, false), 1).unwrap();
    assert!(spots.is_empty());
}

#[test]
fn test_threshold_is_strict() {
    let mut grid = Grid::new_default(&[5, 5]);
    *grid.get_mut(2, 2, 0) = 3.0;
    assert_eq!(
        find_local_maxima(&grid, &search(3.0, false), 1).unwrap().len(),
        0
    );
    assert_eq!(
        find_local_maxima(&grid, &search(2.9, false), 1).unwrap().len(),
        1
    );
}

#[test]
fn test_border_peak_uses_mirrored_neighbours() {
    let mut grid = Grid::new_default(&[5, 5]);
    *grid.get_mut(0, 0, 0) = 4.0;
    *grid.get_mut(1, 0, 0) = 1.0;
    let spots = find_local_maxima(&grid, &search(0.0, false), 1).unwrap();
    assert_eq!(spots.len(), 1);
    assert_eq!(spots[0].position, DVec3::ZERO);
}

#[test]
fn test_3d_peak_checks_all_26_neighbours() {
    let mut grid = Grid::new_default(&[5, 5, 5]);
    *grid.get_mut(2, 2, 2) = 10.0;
    // A higher diagonal neighbour suppresses the center.
    *grid.get_mut(3, 3, 3) = 11.0;
    let spots = find_local_maxima(&grid, &search(0.0, false), 2).unwrap();
    assert_eq!(spots.len(), 1);
    assert_eq!(spots[0].position, DVec3::new(3.0, 3.0, 3.0));
}

#[test]
fn test_one_dimensional_grid() {
    let grid = Grid::new(&[7], vec![0.0, 1.0, 3.0, 1.0, 0.0, 2.0, 0.0]);
    let spots = find_local_maxima(&grid, &search(0.0, false), 1).unwrap();
    let xs: Vec<f64> = spots.iter().map(|s| s.position.x).collect();
    assert_eq!(xs, vec![2.0, 5.0]);
    assert!(spots.iter().all(|s| s.position.y == 0.0 && s.position.z == 0.0));
}

#[test]
fn test_origin_and_calibration_applied() {
    let mut grid = Grid::new_default(&[5, 5]);
    *grid.get_mut(1, 3, 0) = 1.0;
    let params = PeakSearch {
        origin: [10, 20, 0],
        calibration: Calibration::new(0.5, 2.0, 1.0),
        ..search(0.0, false)
    };
    let spots = find_local_maxima(&grid, &params, 1).unwrap();
    assert_eq!(spots[0].position, DVec3::new(5.5, 46.0, 0.0));
}

#[test]
fn test_raster_order_independent_of_threads() {
    let mut grid = Grid::new_default(&[40, 40]);
    for (i, (x, y)) in [(5, 30), (30, 5), (20, 20), (35, 35), (2, 2)].iter().enumerate() {
        *grid.get_mut(*x, *y, 0) = 1.0 + i as f32;
    }
    let a = find_local_maxima(&grid, &search(0.0, false), 1).unwrap();
    let b = find_local_maxima(&grid, &search(0.0, false), 4).unwrap();
    assert_eq!(a, b);
    let order: Vec<(f64, f64)> = a.iter().map(|s| (s.position.x, s.position.y)).collect();
    assert_eq!(
        order,
        vec![(2.0, 2.0), (30.0, 5.0), (20.0, 20.0), (5.0, 30.0), (35.0, 35.0)]
    );
}

// ============================================================================
// Sub-pixel refinement
// ============================================================================

#[test]
fn test_subpixel_recovers_offset_center() {
    let grid = gaussian_2d(21, 21, 10.3, 9.6, 2.5);
    let spots = find_local_maxima(&grid, &search(0.0, true), 1).unwrap();
    assert_eq!(spots.len(), 1);
    let p = spots[0].position;
    assert!((p.x - 10.3).abs() < 0.05, "x = {}", p.x);
    assert!((p.y - 9.6).abs() < 0.05, "y = {}", p.y);
    // Quality stays at the integer peak.
    assert!((spots[0].quality - *grid.get(10, 10, 0) as f64).abs() < 1e-9);
}

#[test]
fn test_subpixel_exact_on_quadratic() {
    // f = -(x - 4.2)^2 - 2 (y - 3.7)^2 is recovered exactly by a quadratic fit.
    let mut grid = Grid::new_default(&[9, 9]);
    for y in 0..9 {
        for x in 0..9 {
            let v = 50.0 - (x as f64 - 4.2).powi(2) - 2.0 * (y as f64 - 3.7).powi(2);
            *grid.get_mut(x, y, 0) = v as f32;
        }
    }
    let refined = refine(&grid, [4, 4, 0]);
    assert!((refined.x - 4.2).abs() < 1e-4);
    assert!((refined.y - 3.7).abs() < 1e-4);
}

#[test]
fn test_subpixel_flat_region_keeps_integer_position() {
    let grid = Grid::new_filled(&[5, 5], 1.0f32);
    let refined = refine(&grid, [2, 2, 0]);
    assert_eq!(refined, DVec3::new(2.0, 2.0, 0.0));
}

#[test]
fn test_subpixel_3d() {
    let mut grid = Grid::new_default(&[11, 11, 11]);
    for z in 0..11 {
        for y in 0..11 {
            for x in 0..11 {
                let r2 = (x as f64 - 5.2).powi(2) + (y as f64 - 4.9).powi(2) + (z as f64 - 5.3).powi(2);
                *grid.get_mut(x, y, z) = (100.0 * (-r2 / 8.0).exp()) as f32;
            }
        }
    }
    let refined = refine(&grid, [5, 5, 5]);
    assert!((refined.x - 5.2).abs() < 0.05);
    assert!((refined.y - 4.9).abs() < 0.05);
    assert!((refined.z - 5.3).abs() < 0.05);
}
