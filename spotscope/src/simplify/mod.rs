//! Polygon resampling, Douglas-Peucker simplification and planar polygon
//! measurements.

#[cfg(test)]
mod tests;

use glam::DVec2;

/// Arclength spacing used by [`simplify_polygon`], in pixels.
pub const RESAMPLE_INTERVAL: f64 = 2.0;

/// Maximum deviation allowed by [`simplify_polygon`], in pixels.
pub const MAX_DEVIATION: f64 = 0.5;

/// Distance from `p` to the segment `a`-`b`.
fn distance_to_segment(p: DVec2, a: DVec2, b: DVec2) -> f64 {
    let ab = b - a;
    let len2 = ab.length_squared();
    if len2 == 0.0 {
        return p.distance(a);
    }
    let t = (p - a).dot(ab) / len2;
    if t < 0.0 {
        p.distance(a)
    } else if t > 1.0 {
        p.distance(b)
    } else {
        p.distance(a + ab * t)
    }
}

/// Ramer-Douglas-Peucker simplification of an open polyline.
///
/// The first and last points are always kept. Every dropped point lies
/// within `epsilon` of the simplified polyline, and simplifying the result
/// again with the same `epsilon` returns it unchanged.
pub fn douglas_peucker(points: &[DVec2], epsilon: f64) -> Vec<DVec2> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;

    let mut stack = vec![(0, points.len() - 1)];
    while let Some((start, end)) = stack.pop() {
        let mut max_dist = 0.0;
        let mut index = start;
        for i in start + 1..end {
            let d = distance_to_segment(points[i], points[start], points[end]);
            if d > max_dist {
                max_dist = d;
                index = i;
            }
        }
        if max_dist > epsilon {
            keep[index] = true;
            stack.push((start, index));
            stack.push((index, end));
        }
    }

    points
        .iter()
        .zip(&keep)
        .filter_map(|(p, &k)| k.then_some(*p))
        .collect()
}

/// Points at equal arclength around a closed polygon, starting at its first
/// vertex.
///
/// The spacing is adjusted to `perimeter / round(perimeter / interval)` so
/// the last step closes exactly onto the first point, which is not repeated.
pub fn resample_closed(points: &[DVec2], interval: f64) -> Vec<DVec2> {
    let n = points.len();
    if n < 2 || interval <= 0.0 {
        return points.to_vec();
    }
    let edge = |i: usize| (points[i], points[(i + 1) % n]);
    let perimeter: f64 = (0..n).map(|i| edge(i).0.distance(edge(i).1)).sum();
    let count = (perimeter / interval).round() as usize;
    if count < 3 {
        return points.to_vec();
    }
    let step = perimeter / count as f64;

    let mut out = Vec::with_capacity(count);
    let mut target = 0.0;
    let mut walked = 0.0;
    for i in 0..n {
        let (a, b) = edge(i);
        let len = a.distance(b);
        while out.len() < count && target <= walked + len {
            let t = if len > 0.0 { (target - walked) / len } else { 0.0 };
            out.push(a.lerp(b, t));
            target += step;
        }
        walked += len;
    }
    out
}

/// Resamples every [`RESAMPLE_INTERVAL`] pixels, then drops vertices within
/// [`MAX_DEVIATION`] of the simplified outline.
pub fn simplify_polygon(points: &[DVec2]) -> Vec<DVec2> {
    douglas_peucker(&resample_closed(points, RESAMPLE_INTERVAL), MAX_DEVIATION)
}

// ============================================================================
// Measurements
// ============================================================================

/// Shoelace area; positive for counter-clockwise winding in a y-up frame.
pub fn signed_area(points: &[DVec2]) -> f64 {
    let n = points.len();
    0.5 * (0..n)
        .map(|i| points[i].perp_dot(points[(i + 1) % n]))
        .sum::<f64>()
}

/// Area centroid of a simple polygon. Falls back to the vertex mean when the
/// area vanishes.
pub fn polygon_centroid(points: &[DVec2]) -> DVec2 {
    let n = points.len();
    if n == 0 {
        return DVec2::ZERO;
    }
    let area = signed_area(points);
    if area.abs() < f64::EPSILON {
        return points.iter().copied().sum::<DVec2>() / n as f64;
    }
    let sum: DVec2 = (0..n)
        .map(|i| {
            let (a, b) = (points[i], points[(i + 1) % n]);
            (a + b) * a.perp_dot(b)
        })
        .sum();
    sum / (6.0 * area)
}

/// Even-odd point-in-polygon test.
pub fn contains_point(points: &[DVec2], p: DVec2) -> bool {
    let n = points.len();
    let mut inside = false;
    let mut j = n.wrapping_sub(1);
    for i in 0..n {
        let (a, b) = (points[i], points[j]);
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}
