use super::*;

fn square(side: f64) -> Vec<DVec2> {
    vec![
        DVec2::new(0.0, 0.0),
        DVec2::new(side, 0.0),
        DVec2::new(side, side),
        DVec2::new(0.0, side),
    ]
}

fn wobbly_line() -> Vec<DVec2> {
    (0..40)
        .map(|i| {
            let x = i as f64 * 0.5;
            DVec2::new(x, (x * 1.7).sin() * 0.8 + (x * 0.3).cos() * 3.0)
        })
        .collect()
}

fn polyline_distance(p: DVec2, line: &[DVec2]) -> f64 {
    line.windows(2)
        .map(|w| distance_to_segment(p, w[0], w[1]))
        .fold(f64::INFINITY, f64::min)
}

#[test]
fn test_douglas_peucker_keeps_endpoints() {
    let points = wobbly_line();
    let simplified = douglas_peucker(&points, 0.5);
    assert_eq!(simplified.first(), points.first());
    assert_eq!(simplified.last(), points.last());
    assert!(simplified.len() < points.len());
}

#[test]
fn test_douglas_peucker_straight_line_collapses() {
    let points: Vec<DVec2> = (0..10).map(|i| DVec2::new(i as f64, 2.0 * i as f64)).collect();
    let simplified = douglas_peucker(&points, 1e-9);
    assert_eq!(simplified, vec![points[0], points[9]]);
}

#[test]
fn test_douglas_peucker_tolerance_bound() {
    let points = wobbly_line();
    for epsilon in [0.1, 0.5, 1.0, 2.0] {
        let simplified = douglas_peucker(&points, epsilon);
        for p in &points {
            assert!(polyline_distance(*p, &simplified) <= epsilon + 1e-12);
        }
    }
}

#[test]
fn test_douglas_peucker_idempotent() {
    let points = wobbly_line();
    for epsilon in [0.1, 0.5, 1.0, 2.0] {
        let once = douglas_peucker(&points, epsilon);
        let twice = douglas_peucker(&once, epsilon);
        assert_eq!(once, twice);
    }
}

#[test]
fn test_douglas_peucker_first_maximum_wins() {
    // Two points at equal distance: the earlier one is the split point.
    let points = vec![
        DVec2::new(0.0, 0.0),
        DVec2::new(1.0, 1.0),
        DVec2::new(2.0, 0.0),
        DVec2::new(3.0, 1.0),
        DVec2::new(4.0, 0.0),
    ];
    let simplified = douglas_peucker(&points, 0.9);
    assert_eq!(simplified[1], DVec2::new(1.0, 1.0));
}

#[test]
fn test_douglas_peucker_short_inputs() {
    assert!(douglas_peucker(&[], 1.0).is_empty());
    let two = [DVec2::ZERO, DVec2::ONE];
    assert_eq!(douglas_peucker(&two, 1.0), two.to_vec());
}

#[test]
fn test_resample_square_spacing() {
    let resampled = resample_closed(&square(10.0), 2.0);
    assert_eq!(resampled.len(), 20);
    assert_eq!(resampled[0], DVec2::ZERO);
    for i in 0..resampled.len() {
        let d = resampled[i].distance(resampled[(i + 1) % resampled.len()]);
        assert!((d - 2.0).abs() < 1e-9, "step {i}: {d}");
    }
}

#[test]
fn test_resample_adjusts_step() {
    // Perimeter 30 at interval 4 gives round(7.5) = 8 steps of 3.75.
    let tri = vec![DVec2::new(0.0, 0.0), DVec2::new(12.0, 0.0), DVec2::new(12.0, 5.0)];
    let resampled = resample_closed(&tri, 4.0);
    assert_eq!(resampled.len(), 8);
    assert!((resampled[1].x - 3.75).abs() < 1e-9);
}

#[test]
fn test_simplify_polygon_square_keeps_corners() {
    let simplified = simplify_polygon(&square(10.0));
    assert!((signed_area(&simplified).abs() - 100.0).abs() < 1e-9);
    assert!(simplified.len() <= 5);
}

#[test]
fn test_area_and_centroid() {
    let sq = square(4.0);
    assert_eq!(signed_area(&sq), 16.0);
    let reversed: Vec<DVec2> = sq.iter().rev().copied().collect();
    assert_eq!(signed_area(&reversed), -16.0);
    assert_eq!(polygon_centroid(&sq), DVec2::new(2.0, 2.0));
    assert_eq!(polygon_centroid(&reversed), DVec2::new(2.0, 2.0));

    let l_shape = vec![
        DVec2::new(0.0, 0.0),
        DVec2::new(2.0, 0.0),
        DVec2::new(2.0, 1.0),
        DVec2::new(1.0, 1.0),
        DVec2::new(1.0, 2.0),
        DVec2::new(0.0, 2.0),
    ];
    let c = polygon_centroid(&l_shape);
    assert!((c.x - 5.0 / 6.0).abs() < 1e-12);
    assert!((c.y - 5.0 / 6.0).abs() < 1e-12);
}

#[test]
fn test_contains_point_even_odd() {
    let sq = square(4.0);
    assert!(contains_point(&sq, DVec2::new(1.0, 1.0)));
    assert!(!contains_point(&sq, DVec2::new(5.0, 1.0)));
    assert!(!contains_point(&sq, DVec2::new(-0.5, 2.0)));
    assert!(!contains_point(&[], DVec2::ZERO));
}
