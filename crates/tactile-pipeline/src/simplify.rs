//! Closed-contour simplification using the Ramer-Douglas-Peucker algorithm.
//!
//! A traced contour is a dense ring of boundary pixels. Reducing it to a
//! handful of vertices is what lets the detector count corners. The ring
//! is split at two mutually distant anchor points, both of which are
//! always kept, and each half is simplified as an open polyline.

use crate::geometry::{Point, PointF, ring_perimeter};

/// Simplify a closed ring with a tolerance proportional to its perimeter.
///
/// `factor` of `0.01` allows each removed point to deviate from the
/// simplified outline by up to 1% of the contour's length.
#[must_use = "returns the simplified ring"]
pub fn simplify_relative(ring: &[Point], factor: f64) -> Vec<Point> {
    simplify_closed(ring, factor * ring_perimeter(ring))
}

/// Simplify a closed ring of points.
///
/// Points within `tolerance` pixels of the simplified outline are
/// removed. Rings with fewer than 3 points are returned unchanged, and a
/// ring whose points all coincide collapses to a single point.
#[must_use = "returns the simplified ring"]
pub fn simplify_closed(ring: &[Point], tolerance: f64) -> Vec<Point> {
    let n = ring.len();
    if n < 3 {
        return ring.to_vec();
    }

    let first = farthest_from(ring, ring[0]);
    let second = farthest_from(ring, ring[first]);
    if ring[first] == ring[second] {
        return vec![ring[first]];
    }

    // Rotate so the first anchor is at index 0 and close the ring by
    // repeating it at index n.
    let mut closed: Vec<Point> = ring[first..].iter().chain(&ring[..first]).copied().collect();
    closed.push(closed[0]);
    let split = (second + n - first) % n;

    let mut kept = vec![false; n + 1];
    kept[0] = true;
    kept[split] = true;

    rdp_recurse(&closed, 0, split, tolerance, &mut kept);
    rdp_recurse(&closed, split, n, tolerance, &mut kept);

    closed[..n]
        .iter()
        .zip(&kept[..n])
        .filter(|&(_, k)| *k)
        .map(|(&p, _)| p)
        .collect()
}

/// Index of the point in `points` farthest from `origin`.
fn farthest_from(points: &[Point], origin: Point) -> usize {
    let origin = origin.to_f();
    let mut best = 0;
    let mut best_dist = -1.0;
    for (i, p) in points.iter().enumerate() {
        let d = p.to_f().distance_squared(origin);
        if d > best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

/// Recursive step of the Ramer-Douglas-Peucker algorithm.
///
/// Finds the point between `start` and `end` that is farthest from the
/// line segment between them. If that distance exceeds `tolerance`, the
/// point is kept and both sub-segments are processed recursively.
fn rdp_recurse(points: &[Point], start: usize, end: usize, tolerance: f64, kept: &mut [bool]) {
    if end <= start + 1 {
        return;
    }

    let (a, b) = (points[start].to_f(), points[end].to_f());
    let mut max_dist = 0.0;
    let mut max_idx = start;

    for (i, p) in points.iter().enumerate().take(end).skip(start + 1) {
        let d = perpendicular_distance(p.to_f(), a, b);
        if d > max_dist {
            max_dist = d;
            max_idx = i;
        }
    }

    if max_dist > tolerance {
        kept[max_idx] = true;
        rdp_recurse(points, start, max_idx, tolerance, kept);
        rdp_recurse(points, max_idx, end, tolerance, kept);
    }
}

/// Perpendicular distance from point `p` to the line defined by `a` and `b`.
///
/// When `a` and `b` coincide, returns the distance from `p` to `a`.
fn perpendicular_distance(p: PointF, a: PointF, b: PointF) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx.mul_add(dx, dy * dy);

    if length_sq == 0.0 {
        return p.distance(a);
    }

    let cross = dx.mul_add(a.y - p.y, -(dy * (a.x - p.x)));
    cross.abs() / length_sq.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Walk the outline of `corners` one pixel at a time, the way a
    /// contour tracer reports a region border.
    fn dense_ring(corners: &[(i32, i32)]) -> Vec<Point> {
        let mut ring = Vec::new();
        for (i, &(x0, y0)) in corners.iter().enumerate() {
            let (x1, y1) = corners[(i + 1) % corners.len()];
            let steps = (x1 - x0).abs().max((y1 - y0).abs());
            for s in 0..steps {
                let x = x0 + (x1 - x0) * s / steps;
                let y = y0 + (y1 - y0) * s / steps;
                ring.push(Point::new(x, y));
            }
        }
        ring
    }

    #[test]
    fn short_rings_unchanged() {
        let ring = vec![Point::new(0, 0), Point::new(4, 0)];
        assert_eq!(simplify_closed(&ring, 1.0), ring);
        assert!(simplify_closed(&[], 1.0).is_empty());
    }

    #[test]
    fn coincident_points_collapse() {
        let ring = vec![Point::new(3, 3); 5];
        assert_eq!(simplify_closed(&ring, 1.0), vec![Point::new(3, 3)]);
    }

    #[test]
    fn rectangle_reduces_to_corners() {
        let ring = dense_ring(&[(10, 10), (130, 10), (130, 160), (10, 160)]);
        let simplified = simplify_relative(&ring, 0.01);
        assert_eq!(simplified.len(), 4);
        for corner in [
            Point::new(10, 10),
            Point::new(130, 10),
            Point::new(130, 160),
            Point::new(10, 160),
        ] {
            assert!(simplified.contains(&corner), "missing {corner:?}");
        }
    }

    #[test]
    fn cut_corner_tile_has_five_vertices() {
        let ring = dense_ring(&[(35, 10), (130, 10), (130, 160), (10, 160), (10, 35)]);
        assert_eq!(simplify_relative(&ring, 0.01).len(), 5);
    }

    #[test]
    fn simplified_ring_keeps_traversal_order() {
        let ring = dense_ring(&[(0, 0), (50, 0), (50, 50), (0, 50)]);
        let simplified = simplify_closed(&ring, 1.0);
        let pos = |p: Point| ring.iter().position(|&q| q == p).unwrap_or(usize::MAX);
        let mut positions: Vec<usize> = simplified.iter().map(|&p| pos(p)).collect();
        // Some rotation of increasing ring positions.
        let min_at = positions
            .iter()
            .enumerate()
            .min_by_key(|&(_, v)| *v)
            .map_or(0, |(i, _)| i);
        positions.rotate_left(min_at);
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{positions:?}");
    }

    #[test]
    fn perpendicular_distance_on_axis() {
        let d = perpendicular_distance(
            PointF::new(1.0, 3.0),
            PointF::new(0.0, 0.0),
            PointF::new(2.0, 0.0),
        );
        assert!((d - 3.0).abs() < 1e-10);
    }

    #[test]
    fn perpendicular_distance_coincident_endpoints() {
        let d = perpendicular_distance(
            PointF::new(3.0, 4.0),
            PointF::new(0.0, 0.0),
            PointF::new(0.0, 0.0),
        );
        assert!((d - 5.0).abs() < 1e-10);
    }
}
