//! Tile rectification: undo rotation and perspective skew.
//!
//! A candidate outline is reduced to four ordered corners by a pluggable
//! [`CornerStrategy`], checked against the expected tile proportions, and
//! warped onto an upright rectangle with a projective transform.
//!
//! # Corner ordering
//!
//! Tiles have their top-left corner cut off, so the outline has no
//! vertex at the true top-left, and the cut is the only mark of which way
//! up a tile lies. [`CornerStrategyKind::CutEdge`] finds the two shallow
//! vertices bounding the cut and walks clockwise from there, so tiles
//! lying sideways or upside down come out upright; the missing corner is
//! where the sides leading into the cut meet. Outlines with no cut are
//! ordered by their minimum-area enclosing rectangle.
//! [`CornerStrategyKind::CutCorner`] reconstructs the top-left corner
//! from the two vertices with the smallest coordinate sums and only works
//! for tiles that are roughly upright.
//!
//! Whatever the strategy, a quad whose top-left is not the cut corner is
//! rejected as [`Rejection::Misoriented`] rather than read wrong way up.

use std::fmt;

use image::GrayImage;
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use imageproc::geometry::min_area_rect;
use serde::{Deserialize, Serialize};

use crate::detect::Candidate;
use crate::geometry::{BoundingBox, Point, PointF, Polygon, signed_double_area};
use crate::types::PipelineConfig;

/// Four corners in clockwise order starting at the top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quad {
    /// Top-left corner (possibly reconstructed).
    pub top_left: PointF,
    /// Top-right corner.
    pub top_right: PointF,
    /// Bottom-right corner.
    pub bottom_right: PointF,
    /// Bottom-left corner.
    pub bottom_left: PointF,
}

impl Quad {
    /// Corners in clockwise order, as `imageproc` control points.
    #[must_use]
    pub fn control_points(&self) -> [(f32, f32); 4] {
        [
            self.top_left.to_f32_pair(),
            self.top_right.to_f32_pair(),
            self.bottom_right.to_f32_pair(),
            self.bottom_left.to_f32_pair(),
        ]
    }

    /// Height over width measured along the right and bottom edges, the
    /// two edges that never touch the cut corner. `None` when the bottom
    /// edge has no length.
    #[must_use]
    pub fn aspect_ratio(&self) -> Option<f64> {
        let height = self.bottom_right.distance(self.top_right);
        let width = self.bottom_right.distance(self.bottom_left);
        let ratio = height / width;
        (width > 0.0 && ratio.is_finite()).then_some(ratio)
    }

    /// Output raster size: the shorter of each pair of opposite edges,
    /// truncated to whole pixels. `None` when either side is under two
    /// pixels.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    #[must_use]
    pub fn output_size(&self) -> Option<(u32, u32)> {
        let width = self
            .top_left
            .distance(self.top_right)
            .min(self.bottom_left.distance(self.bottom_right));
        let height = self
            .top_left
            .distance(self.bottom_left)
            .min(self.top_right.distance(self.bottom_right));
        if !(width.is_finite() && height.is_finite()) {
            return None;
        }
        let (w, h) = (width as u32, height as u32);
        (w >= 2 && h >= 2).then_some((w, h))
    }
}

/// Turns gentler than this (radians, about 20 degrees) are contour noise
/// along a side rather than corners.
const MIN_CORNER_TURN: f64 = 0.35;

/// Either end of a cut turns about 45 degrees and a true corner about 90.
/// A vertex turning more than this (about 67 degrees) cannot bound a cut.
const MAX_CUT_TURN: f64 = 1.18;

/// Selects how tile corners are picked from an outline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CornerStrategyKind {
    /// Find the cut from the outline's turning angles and walk clockwise
    /// from it. Any in-plane rotation. Outlines without a recognisable
    /// cut fall back to the minimum-area enclosing rectangle.
    #[default]
    CutEdge,
    /// Reconstruct the cut top-left corner from the two vertices with the
    /// smallest coordinate sums. Roughly upright tiles only.
    CutCorner,
}

/// Trait for corner ordering strategies.
///
/// Implementations are pure: the same points always give the same quad.
pub trait CornerStrategy {
    /// Order `points` into a quad. `max_dimension` is the longer side of
    /// the image the points came from. Returns `None` when there are too
    /// few points to choose from.
    fn order(&self, points: &[Point], max_dimension: u32) -> Option<Quad>;
}

impl CornerStrategy for CornerStrategyKind {
    fn order(&self, points: &[Point], max_dimension: u32) -> Option<Quad> {
        match *self {
            Self::CutEdge => order_cut_edge(points),
            Self::CutCorner => order_cut_corner(points, max_dimension),
        }
    }
}

fn order_cut_edge(points: &[Point]) -> Option<Quad> {
    if let Some(quad) = find_cut(points) {
        return Some(quad);
    }

    let rectangle = enclosing_rectangle(points)?;
    let snap = |r: PointF| {
        points
            .iter()
            .map(|p| p.to_f())
            .min_by(|a, b| a.distance(r).total_cmp(&b.distance(r)))
    };
    Some(Quad {
        top_left: snap(rectangle[0])?,
        top_right: snap(rectangle[1])?,
        bottom_right: snap(rectangle[2])?,
        bottom_left: snap(rectangle[3])?,
    })
}

/// Locate the cut on a tile outline and order the corners clockwise from
/// the reconstructed top-left.
///
/// The outline must have exactly five corners, two of them adjacent and
/// shallow. The missing corner is where the sides leading into the cut
/// meet, which stays correct under perspective skew.
fn find_cut(points: &[Point]) -> Option<Quad> {
    let mut ring: Vec<PointF> = points.iter().map(|p| p.to_f()).collect();
    if signed_double_area(points) < 0 {
        ring.reverse();
    }

    let n = ring.len();
    let corners: Vec<(PointF, f64)> = (0..n)
        .filter_map(|i| {
            let turn = turn_angle(ring[(i + n - 1) % n], ring[i], ring[(i + 1) % n])?;
            (turn > MIN_CORNER_TURN).then_some((ring[i], turn))
        })
        .collect();
    if corners.len() != 5 {
        return None;
    }

    let at = |k: usize| corners[k % 5];
    let start = (0..5).min_by(|&a, &b| {
        let pair = |i: usize| at(i).1 + at(i + 1).1;
        pair(a).total_cmp(&pair(b))
    })?;
    let corner = |k: usize| at(start + k);
    if corner(0).1 > MAX_CUT_TURN || corner(1).1 > MAX_CUT_TURN {
        return None;
    }

    let top_left = line_intersection((corner(4).0, corner(0).0), (corner(1).0, corner(2).0))?;
    Some(Quad {
        top_left,
        top_right: corner(2).0,
        bottom_right: corner(3).0,
        bottom_left: corner(4).0,
    })
}

/// Unsigned change of direction at `b` walking `a -> b -> c`. `None`
/// when either step has no length.
fn turn_angle(a: PointF, b: PointF, c: PointF) -> Option<f64> {
    let (ux, uy) = (b.x - a.x, b.y - a.y);
    let (vx, vy) = (c.x - b.x, c.y - b.y);
    if ux.hypot(uy) < f64::EPSILON || vx.hypot(vy) < f64::EPSILON {
        return None;
    }
    let cross = ux.mul_add(vy, -(uy * vx));
    let dot = ux.mul_add(vx, uy * vy);
    Some(cross.abs().atan2(dot))
}

/// Where the line through `a` meets the line through `b`. `None` for
/// (nearly) parallel lines.
fn line_intersection(a: (PointF, PointF), b: (PointF, PointF)) -> Option<PointF> {
    let (dax, day) = (a.1.x - a.0.x, a.1.y - a.0.y);
    let (dbx, dby) = (b.1.x - b.0.x, b.1.y - b.0.y);
    let denom = dax.mul_add(dby, -(day * dbx));
    if denom.abs() < 1e-9 {
        return None;
    }
    let (ox, oy) = (b.0.x - a.0.x, b.0.y - a.0.y);
    let t = ox.mul_add(dby, -(oy * dbx)) / denom;
    Some(PointF::new(t.mul_add(dax, a.0.x), t.mul_add(day, a.0.y)))
}

/// Minimum-area rectangle around `points`, clockwise from its upper-left
/// corner. `None` for an empty point set.
fn enclosing_rectangle(points: &[Point]) -> Option<[PointF; 4]> {
    // Repeated points break the hull's angular sort.
    let mut unique: Vec<imageproc::point::Point<i32>> = points
        .iter()
        .map(|p| imageproc::point::Point::new(p.x, p.y))
        .collect();
    unique.sort_by_key(|p| (p.x, p.y));
    unique.dedup();
    if unique.is_empty() {
        return None;
    }
    Some(min_area_rect(&unique).map(|p| Point::from(p).to_f()))
}

fn order_cut_corner(points: &[Point], max_dimension: u32) -> Option<Quad> {
    if points.len() < 2 {
        return None;
    }
    let m = i64::from(max_dimension);

    let bottom_right = *points.iter().max_by_key(|p| p.coordinate_sum())?;

    let mut by_sum = points.to_vec();
    by_sum.sort_by_key(|p| (p.coordinate_sum(), p.y, p.x));
    let (a, b) = (by_sum[0], by_sum[1]);
    let (top, bottom) = if a.y < b.y || (a.y == b.y && a.x > b.x) {
        (a, b)
    } else {
        (b, a)
    };
    let top_left = PointF::new(f64::from(bottom.x), f64::from(top.y));

    let top_right = *points
        .iter()
        .max_by_key(|p| i64::from(p.x) + (m - i64::from(p.y)))?;
    let bottom_left = *points
        .iter()
        .max_by_key(|p| (m - i64::from(p.x)) + i64::from(p.y))?;

    Some(Quad {
        top_left,
        top_right: top_right.to_f(),
        bottom_right: bottom_right.to_f(),
        bottom_left: bottom_left.to_f(),
    })
}

/// Why a candidate could not be rectified.
///
/// A rejection is an expected outcome for false-positive candidates, not
/// a pipeline error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Rejection {
    /// The outline has fewer than two vertices.
    TooFewCorners,
    /// The ordered corners enclose no usable area.
    Degenerate,
    /// The cut corner of the outline is not the quad's top-left, so the
    /// tile would be read sideways or upside down.
    Misoriented,
    /// Height over width is too far from the expected tile proportions.
    AspectRatio {
        /// The measured height / width ratio.
        ratio: f64,
    },
    /// No projective transform maps the corners onto a rectangle.
    SingularTransform,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooFewCorners => f.write_str("too few corners"),
            Self::Degenerate => f.write_str("degenerate corners"),
            Self::Misoriented => f.write_str("cut corner is not top-left"),
            Self::AspectRatio { ratio } => write!(f, "aspect ratio {ratio:.2} out of range"),
            Self::SingularTransform => f.write_str("singular perspective transform"),
        }
    }
}

/// A tile warped upright, with where it came from.
#[derive(Debug, Clone)]
pub struct RectifiedTile {
    /// Position in reading order among all candidates of the image.
    pub index: usize,
    /// The upright tile raster.
    pub image: GrayImage,
    /// Bounds of the source outline in the working image.
    pub bbox: BoundingBox,
    /// The source outline.
    pub polygon: Polygon,
    /// The corners used for the warp.
    pub corners: Quad,
}

/// Warp one candidate out of `source` into an upright tile.
///
/// # Errors
///
/// Returns a [`Rejection`] when no usable corners can be found, when the
/// cut corner does not end up top-left, when the proportions are outside
/// `config.aspect_tolerance` of `config.aspect_ratio`, or when the warp
/// is singular.
pub fn rectify(
    source: &GrayImage,
    candidate: &Candidate,
    index: usize,
    config: &PipelineConfig,
) -> Result<RectifiedTile, Rejection> {
    let max_dimension = source.width().max(source.height());
    let corners = config
        .corner_strategy
        .order(candidate.polygon.points(), max_dimension)
        .ok_or(Rejection::TooFewCorners)?;

    if let Some(cut) = find_cut(candidate.polygon.points())
        && nearest_corner(&corners, cut.top_left) != 0
    {
        return Err(Rejection::Misoriented);
    }

    let ratio = corners.aspect_ratio().ok_or(Rejection::Degenerate)?;
    if (ratio - config.aspect_ratio).abs() > config.aspect_tolerance {
        return Err(Rejection::AspectRatio { ratio });
    }

    let (w, h) = corners.output_size().ok_or(Rejection::Degenerate)?;
    let image = warp_to_rectangle(source, &corners, w, h)?;

    Ok(RectifiedTile {
        index,
        image,
        bbox: candidate.bbox,
        polygon: candidate.polygon.clone(),
        corners,
    })
}

/// Index of the quad corner closest to `p`, clockwise from top-left.
fn nearest_corner(quad: &Quad, p: PointF) -> usize {
    [quad.top_left, quad.top_right, quad.bottom_right, quad.bottom_left]
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.distance(p).total_cmp(&b.1.distance(p)))
        .map_or(0, |(i, _)| i)
}

#[allow(clippy::cast_precision_loss)]
fn warp_to_rectangle(
    source: &GrayImage,
    corners: &Quad,
    width: u32,
    height: u32,
) -> Result<GrayImage, Rejection> {
    let (right, bottom) = ((width - 1) as f32, (height - 1) as f32);
    let dest = [(0.0, 0.0), (right, 0.0), (right, bottom), (0.0, bottom)];
    let projection = Projection::from_control_points(corners.control_points(), dest)
        .ok_or(Rejection::SingularTransform)?;

    let mut out = GrayImage::new(width, height);
    warp_into(
        source,
        &projection,
        Interpolation::Bilinear,
        image::Luma([0]),
        &mut out,
    );
    Ok(out)
}
