use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::*;

fn mask(rows: &[&str]) -> BitGrid {
    let h = rows.len();
    let w = rows[0].len();
    let mut mask = BitGrid::new(&[w, h]);
    for (y, row) in rows.iter().enumerate() {
        for (x, c) in row.chars().enumerate() {
            mask.set(x, y, 0, c == '#');
        }
    }
    mask
}

fn junctions(rows: &[&str]) -> Vec<(Edge, Junction)> {
    let mut seen = Vec::new();
    trace_with(&mask(rows), |edge, junction| seen.push((edge, junction)));
    seen
}

fn pt(x: i32, y: i32) -> IVec2 {
    IVec2::new(x, y)
}

#[test]
fn test_empty_mask() {
    assert!(trace_outlines(&mask(&["....", "....", "....", "...."])).is_empty());
}

#[test]
fn test_single_pixel() {
    let polygons = trace_outlines(&mask(&["....", ".#..", "....", "...."]));
    assert_eq!(polygons, vec![vec![pt(2, 2), pt(2, 1), pt(1, 1), pt(1, 2)]]);
    assert_eq!(signed_area(&polygons[0]).abs(), 1);
}

#[test]
fn test_full_mask_is_one_rectangle() {
    let polygons = trace_outlines(&mask(&["####", "####", "####", "####"]));
    assert_eq!(polygons.len(), 1);
    assert_eq!(polygons[0].len(), 4);
    assert_eq!(signed_area(&polygons[0]).abs(), 16);
}

#[test]
fn test_one_dimensional_mask() {
    let mut line = BitGrid::new(&[6]);
    for x in 1..4 {
        line.set(x, 0, 0, true);
    }
    let polygons = trace_outlines(&line);
    assert_eq!(polygons.len(), 1);
    assert_eq!(signed_area(&polygons[0]).abs(), 3);
}

#[test]
fn test_start_and_close() {
    assert_eq!(
        junctions(&["....", ".#..", "....", "...."]),
        vec![(Edge::Upper, Junction::Start), (Edge::Lower, Junction::Close)]
    );
}

#[test]
fn test_extend_from_right() {
    let seen = junctions(&[".#..", "##..", "....", "...."]);
    assert!(seen.contains(&(Edge::Upper, Junction::ExtendFromRight)));
}

#[test]
fn test_extend_from_left() {
    let seen = junctions(&["#...", "##..", "....", "...."]);
    assert!(seen.contains(&(Edge::Upper, Junction::ExtendFromLeft { after_corner: false })));
}

#[test]
fn test_diagonal_corner_keeps_one_outline() {
    let rows = ["#...", ".#..", "....", "...."];
    assert_eq!(
        junctions(&rows),
        vec![
            (Edge::Upper, Junction::Start),
            (Edge::Lower, Junction::CornerContinue),
            (Edge::Upper, Junction::ExtendFromLeft { after_corner: true }),
            (Edge::Lower, Junction::Close),
        ]
    );
    let polygons = trace_outlines(&mask(&rows));
    assert_eq!(polygons.len(), 1);
    assert_eq!(polygons[0].len(), 8);
    assert_eq!(signed_area(&polygons[0]).abs(), 2);
}

#[test]
fn test_upper_merge_of_two_arms() {
    let rows = ["#.#.", "###.", "....", "...."];
    let seen = junctions(&rows);
    assert!(seen.contains(&(Edge::Upper, Junction::Merge)));
    let polygons = trace_outlines(&mask(&rows));
    assert_eq!(polygons.len(), 1);
    assert_eq!(signed_area(&polygons[0]).abs(), 5);
}

#[test]
fn test_hole_is_discarded() {
    let rows = ["###.", "#.#.", "###.", "...."];
    let seen = junctions(&rows);
    // The hole closes on its top edge.
    assert!(seen.contains(&(Edge::Upper, Junction::Close)));
    let polygons = trace_outlines(&mask(&rows));
    assert_eq!(polygons.len(), 1);
    assert_eq!(polygons[0].len(), 4);
    assert_eq!(signed_area(&polygons[0]).abs(), 9);
}

#[test]
fn test_diagonally_sealed_hole_is_filled() {
    // The background pixel at (1, 1) only touches the outside diagonally.
    let rows = ["####", "#.##", "##..", "...."];
    let seen = junctions(&rows);
    assert!(seen.contains(&(Edge::Upper, Junction::Close)));
    assert!(!seen.contains(&(Edge::Upper, Junction::CornerContinue)));
    let polygons = trace_outlines(&mask(&rows));
    assert_eq!(polygons.len(), 1);
    assert_eq!(signed_area(&polygons[0]).abs(), 10);
}

#[test]
fn test_lower_corner_start() {
    let rows = [".#..", "#.#.", "....", "...."];
    assert_eq!(
        junctions(&rows),
        vec![
            (Edge::Upper, Junction::Start),
            (Edge::Upper, Junction::ExtendFromRight),
            (Edge::Lower, Junction::CornerStart),
            (Edge::Upper, Junction::ExtendFromLeft { after_corner: true }),
            (Edge::Lower, Junction::Merge),
            (Edge::Lower, Junction::Close),
        ]
    );
    let polygons = trace_outlines(&mask(&rows));
    assert_eq!(polygons.len(), 1);
    assert_eq!(signed_area(&polygons[0]).abs(), 3);
}

#[test]
fn test_diagonal_arm_joins_outline() {
    let rows = [".####", "##...", "#.#.."];
    let polygons = trace_outlines(&mask(&rows));
    assert_eq!(polygons.len(), 1);
    assert_eq!(signed_area(&polygons[0]).abs(), 8);
}

#[test]
fn test_lower_corner_hand_off() {
    let rows = ["###.", "#.#.", ".#..", "...."];
    let seen = junctions(&rows);
    assert!(seen.contains(&(Edge::Lower, Junction::CornerHandOff)));
    let polygons = trace_outlines(&mask(&rows));
    assert_eq!(polygons.len(), 1);
    // Six pixels plus the enclosed one at (1, 1).
    assert_eq!(signed_area(&polygons[0]).abs(), 7);
}

#[test]
fn test_separate_components() {
    let polygons = trace_outlines(&mask(&["##..", "##..", "..##", "..##"]));
    // Diagonal contact at (1,1)-(2,2) joins the two blocks.
    assert_eq!(polygons.len(), 1);
    assert_eq!(signed_area(&polygons[0]).abs(), 8);

    let polygons = trace_outlines(&mask(&["#..#", "....", "....", "#..#"]));
    assert_eq!(polygons.len(), 4);
}

#[test]
fn test_no_collinear_vertices() {
    let polygons = trace_outlines(&mask(&["####", "####", "##..", "##.."]));
    let p = &polygons[0];
    let n = p.len();
    for i in 0..n {
        assert!(!collinear(p[(i + n - 1) % n], p[i], p[(i + 1) % n]), "{p:?}");
    }
}

// ============================================================================
// Reference comparison
// ============================================================================

fn mask_from_bits(bits: u32) -> BitGrid {
    let mut mask = BitGrid::new(&[4, 4]);
    for i in 0..16 {
        mask.set(i % 4, i / 4, 0, bits & (1 << i) != 0);
    }
    mask
}

/// Expected polygon areas, sorted: for every 8-connected component, its
/// pixels plus the background pixels it cuts off from the image border
/// under 4-connectivity.
fn reference_areas(mask: &BitGrid) -> Vec<i64> {
    let [w, h, _] = mask.dims();
    let mut component = vec![usize::MAX; w * h];
    let mut count = 0;
    for start in 0..w * h {
        if !mask.get(start % w, start / w, 0) || component[start] != usize::MAX {
            continue;
        }
        component[start] = count;
        let mut stack = vec![(start % w, start / w)];
        while let Some((x, y)) = stack.pop() {
            for ny in y.saturating_sub(1)..(y + 2).min(h) {
                for nx in x.saturating_sub(1)..(x + 2).min(w) {
                    if mask.get(nx, ny, 0) && component[ny * w + nx] == usize::MAX {
                        component[ny * w + nx] = count;
                        stack.push((nx, ny));
                    }
                }
            }
        }
        count += 1;
    }

    // Flood the padded frame from its corner, walled by one component.
    let (pw, ph) = (w + 2, h + 2);
    let mut areas: Vec<i64> = (0..count)
        .map(|c| {
            let wall = |x: usize, y: usize| {
                (1..=w).contains(&x) && (1..=h).contains(&y) && component[(y - 1) * w + x - 1] == c
            };
            let mut outside = vec![false; pw * ph];
            outside[0] = true;
            let mut stack = vec![(0usize, 0usize)];
            while let Some((x, y)) = stack.pop() {
                let neighbours = [
                    (x.wrapping_sub(1), y),
                    (x + 1, y),
                    (x, y.wrapping_sub(1)),
                    (x, y + 1),
                ];
                for (nx, ny) in neighbours {
                    if nx < pw && ny < ph && !outside[ny * pw + nx] && !wall(nx, ny) {
                        outside[ny * pw + nx] = true;
                        stack.push((nx, ny));
                    }
                }
            }
            outside.iter().filter(|&&o| !o).count() as i64
        })
        .collect();
    areas.sort_unstable();
    areas
}

fn traced_areas(polygons: &[Vec<IVec2>]) -> Vec<i64> {
    let mut areas: Vec<i64> = polygons.iter().map(|p| signed_area(p).abs()).collect();
    areas.sort_unstable();
    areas
}

#[test]
fn test_every_4x4_mask() {
    let mut variants = HashSet::new();
    for bits in 0..(1u32 << 16) {
        let mask = mask_from_bits(bits);
        let polygons = trace_with(&mask, |_, junction| {
            variants.insert(std::mem::discriminant(&junction));
        });

        assert_eq!(traced_areas(&polygons), reference_areas(&mask), "mask {bits:#06x}");
        assert!(polygons.iter().all(|p| p.len() >= 4), "mask {bits:#06x}");
    }
    // Start, corner start, both extends, corner continue, close, hand-off
    // and merge.
    assert_eq!(variants.len(), 8);
}

#[test]
fn test_random_masks_match_flood_fill() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..3000 {
        let w = rng.random_range(1..=12);
        let h = rng.random_range(1..=12);
        let density: f64 = rng.random();
        let mut mask = BitGrid::new(&[w, h]);
        for y in 0..h {
            for x in 0..w {
                mask.set(x, y, 0, rng.random_bool(density));
            }
        }

        let polygons = trace_outlines(&mask);
        assert_eq!(traced_areas(&polygons), reference_areas(&mask), "{w}x{h} {mask:?}");
        for p in &polygons {
            let n = p.len();
            assert!(n >= 4);
            assert!((0..n).all(|i| !collinear(p[(i + n - 1) % n], p[i], p[(i + 1) % n])));
        }
    }
}
