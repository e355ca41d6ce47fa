//! Contour tracing: extract region outlines from a binary image.
//!
//! This module defines the [`ContourTracer`] trait for pluggable contour
//! tracing algorithms and the [`ContourTracerKind`] enum for selecting
//! which algorithm to use at runtime. Tile detection and dot finding both
//! only care about the outer border of each foreground region; hole
//! borders are discarded here.

use image::GrayImage;
use imageproc::contours::BorderType;
use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// Selects which contour tracing algorithm to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContourTracerKind {
    /// Suzuki-Abe border following via `imageproc::contours::find_contours`.
    #[default]
    BorderFollowing,
}

/// Trait for contour tracing strategies.
///
/// Input: a binary image (non-zero pixels = foreground).
/// Output: one closed point ring per foreground region's outer border.
pub trait ContourTracer {
    /// Trace the outer borders in the given binary image.
    fn trace(&self, binary: &GrayImage) -> Vec<Vec<Point>>;
}

impl ContourTracer for ContourTracerKind {
    fn trace(&self, binary: &GrayImage) -> Vec<Vec<Point>> {
        match *self {
            Self::BorderFollowing => trace_border_following(binary),
        }
    }
}

fn trace_border_following(binary: &GrayImage) -> Vec<Vec<Point>> {
    imageproc::contours::find_contours::<i32>(binary)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && !c.points.is_empty())
        .map(|c| c.points.into_iter().map(Point::from).collect())
        .collect()
}
