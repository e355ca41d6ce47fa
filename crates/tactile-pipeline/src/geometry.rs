//! Plane geometry for contours and tile outlines.
//!
//! Contour tracing yields integer pixel coordinates, so [`Point`] is
//! integral. Derived quantities that land between pixels (centroids,
//! reconstructed corners) use [`PointF`].

use serde::{Deserialize, Serialize};

/// A pixel position in image coordinates (origin top-left, y down).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: i32,
    /// Vertical position (pixels from top edge).
    pub y: i32,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.to_f().distance(other.to_f())
    }

    /// Sum of the coordinates, the diagonal used to find extreme corners.
    #[must_use]
    pub fn coordinate_sum(self) -> i64 {
        i64::from(self.x) + i64::from(self.y)
    }

    /// Lossless conversion to a floating-point point.
    #[must_use]
    pub fn to_f(self) -> PointF {
        PointF::new(f64::from(self.x), f64::from(self.y))
    }
}

impl From<imageproc::point::Point<i32>> for Point {
    fn from(p: imageproc::point::Point<i32>) -> Self {
        Self::new(p.x, p.y)
    }
}

/// A sub-pixel position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointF {
    /// Horizontal position.
    pub x: f64,
    /// Vertical position.
    pub y: f64,
}

impl PointF {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Narrowing conversion for `imageproc` control points.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn to_f32_pair(self) -> (f32, f32) {
        (self.x as f32, self.y as f32)
    }
}

/// Axis-aligned bounding box. `width` and `height` count pixels, so a
/// single pixel has a 1x1 box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl BoundingBox {
    /// Create a new bounding box.
    #[must_use]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Smallest box covering every point, or `None` for an empty slice.
    #[must_use]
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self::new(
            min_x,
            min_y,
            max_x.abs_diff(min_x) + 1,
            max_y.abs_diff(min_y) + 1,
        ))
    }

    /// Exclusive right edge.
    #[must_use]
    pub fn right(&self) -> i64 {
        i64::from(self.x) + i64::from(self.width)
    }

    /// Exclusive bottom edge.
    #[must_use]
    pub fn bottom(&self) -> i64 {
        i64::from(self.y) + i64::from(self.height)
    }

    /// Geometric centre.
    #[must_use]
    pub fn center(&self) -> PointF {
        PointF::new(
            f64::from(self.x) + f64::from(self.width) / 2.0,
            f64::from(self.y) + f64::from(self.height) / 2.0,
        )
    }

    /// Whether `other` lies entirely inside `self` (edges may touch).
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        self.x <= other.x
            && self.y <= other.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}

/// A closed polygon; the last vertex connects back to the first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Polygon(Vec<Point>);

impl Polygon {
    /// Create a polygon from its vertices in traversal order.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// The vertices in traversal order.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Number of vertices.
    #[must_use]
    pub const fn vertex_count(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the polygon has no vertices.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Enclosed area (shoelace formula), always non-negative.
    #[must_use]
    pub fn area(&self) -> f64 {
        ring_area(&self.0)
    }

    /// Length of the closed outline.
    #[must_use]
    pub fn perimeter(&self) -> f64 {
        ring_perimeter(&self.0)
    }

    /// Area-weighted centroid. Degenerate (zero-area) polygons fall back
    /// to the mean of their vertices; empty polygons have none.
    #[must_use]
    pub fn centroid(&self) -> Option<PointF> {
        ring_centroid(&self.0)
    }

    /// Axis-aligned bounds of the vertices.
    #[must_use]
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(&self.0)
    }

    /// Whether every turn along the outline has the same direction.
    ///
    /// Collinear vertices are ignored. Fewer than three vertices, or a
    /// polygon whose vertices are all collinear, is not convex.
    #[must_use]
    pub fn is_convex(&self) -> bool {
        let n = self.0.len();
        if n < 3 {
            return false;
        }

        let mut sign = 0i64;
        for i in 0..n {
            let a = self.0[i];
            let b = self.0[(i + 1) % n];
            let c = self.0[(i + 2) % n];
            let cross = cross(a, b, c);
            if cross == 0 {
                continue;
            }
            let s = cross.signum();
            if sign == 0 {
                sign = s;
            } else if s != sign {
                return false;
            }
        }
        sign != 0
    }
}

/// Z component of `(b - a) x (c - b)`.
fn cross(a: Point, b: Point, c: Point) -> i64 {
    let (abx, aby) = (i64::from(b.x) - i64::from(a.x), i64::from(b.y) - i64::from(a.y));
    let (bcx, bcy) = (i64::from(c.x) - i64::from(b.x), i64::from(c.y) - i64::from(b.y));
    abx * bcy - aby * bcx
}

/// Twice the signed area of a closed ring.
pub(crate) fn signed_double_area(points: &[Point]) -> i64 {
    let n = points.len();
    (0..n)
        .map(|i| {
            let p = points[i];
            let q = points[(i + 1) % n];
            i64::from(p.x) * i64::from(q.y) - i64::from(q.x) * i64::from(p.y)
        })
        .sum()
}

/// Enclosed area of a closed ring of points (e.g. a raw traced contour).
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn ring_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    signed_double_area(points).unsigned_abs() as f64 / 2.0
}

/// Perimeter of a closed ring of points.
#[must_use]
pub fn ring_perimeter(points: &[Point]) -> f64 {
    let n = points.len();
    if n < 2 {
        return 0.0;
    }
    (0..n).map(|i| points[i].distance(points[(i + 1) % n])).sum()
}

#[allow(clippy::cast_precision_loss)]
fn ring_centroid(points: &[Point]) -> Option<PointF> {
    if points.is_empty() {
        return None;
    }

    let double_area = signed_double_area(points);
    if double_area == 0 {
        let n = points.len() as f64;
        let (sx, sy) = points.iter().fold((0.0, 0.0), |(sx, sy), p| {
            (sx + f64::from(p.x), sy + f64::from(p.y))
        });
        return Some(PointF::new(sx / n, sy / n));
    }

    let n = points.len();
    let (mut cx, mut cy) = (0.0, 0.0);
    for i in 0..n {
        let p = points[i].to_f();
        let q = points[(i + 1) % n].to_f();
        let c = p.x.mul_add(q.y, -(q.x * p.y));
        cx += (p.x + q.x) * c;
        cy += (p.y + q.y) * c;
    }
    let scale = 3.0 * double_area as f64;
    Some(PointF::new(cx / scale, cy / scale))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn rect(x: i32, y: i32, w: i32, h: i32) -> Polygon {
        Polygon::new(vec![
            Point::new(x, y),
            Point::new(x + w, y),
            Point::new(x + w, y + h),
            Point::new(x, y + h),
        ])
    }

    #[test]
    fn distance_is_euclidean() {
        assert!((Point::new(0, 0).distance(Point::new(3, 4)) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn bounding_box_counts_pixels() {
        let bb = BoundingBox::from_points(&[Point::new(2, 3), Point::new(5, 9)]).unwrap();
        assert_eq!(bb, BoundingBox::new(2, 3, 4, 7));
        assert!(BoundingBox::from_points(&[]).is_none());
    }

    #[test]
    fn containment_is_inclusive() {
        let outer = BoundingBox::new(0, 0, 10, 10);
        assert!(outer.contains(&BoundingBox::new(0, 0, 10, 10)));
        assert!(outer.contains(&BoundingBox::new(2, 2, 3, 3)));
        assert!(!outer.contains(&BoundingBox::new(8, 8, 3, 3)));
        assert!(!outer.contains(&BoundingBox::new(-1, 2, 3, 3)));
    }

    #[test]
    fn rectangle_area_perimeter_centroid() {
        let r = rect(10, 20, 40, 30);
        assert!((r.area() - 1200.0).abs() < 1e-9);
        assert!((r.perimeter() - 140.0).abs() < 1e-9);
        let c = r.centroid().unwrap();
        assert!((c.x - 30.0).abs() < 1e-9);
        assert!((c.y - 35.0).abs() < 1e-9);
    }

    #[test]
    fn area_ignores_winding() {
        let mut pts = rect(0, 0, 5, 5).points().to_vec();
        pts.reverse();
        assert!((Polygon::new(pts).area() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn collinear_centroid_falls_back_to_mean() {
        let line = Polygon::new(vec![Point::new(0, 0), Point::new(2, 0), Point::new(4, 0)]);
        let c = line.centroid().unwrap();
        assert!((c.x - 2.0).abs() < 1e-9);
        assert!(c.y.abs() < 1e-9);
        assert!(Polygon::new(vec![]).centroid().is_none());
    }

    #[test]
    fn convexity() {
        assert!(rect(0, 0, 10, 10).is_convex());

        let pentagon = Polygon::new(vec![
            Point::new(5, 0),
            Point::new(20, 0),
            Point::new(20, 25),
            Point::new(0, 25),
            Point::new(0, 5),
        ]);
        assert!(pentagon.is_convex());

        let notch = Polygon::new(vec![
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(5, 3),
            Point::new(10, 10),
            Point::new(0, 10),
        ]);
        assert!(!notch.is_convex());

        let flat = Polygon::new(vec![Point::new(0, 0), Point::new(1, 0), Point::new(2, 0)]);
        assert!(!flat.is_convex());
    }
}
