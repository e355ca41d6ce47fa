//! Tile candidate detection.
//!
//! Finds bright, convex, tile-sized regions with a handful of corners:
//! blur -> adaptive threshold -> opening -> outer contours ->
//! simplification -> shape filter. A physical tile has one cut corner, so
//! its outline simplifies to five vertices; perspective and contour noise
//! can add a few more, hence the 5..=9 window.

use std::time::Duration;

use image::GrayImage;

use crate::contour::ContourTracer;
use crate::diagnostics::timed;
use crate::geometry::{BoundingBox, Point, PointF, Polygon, ring_area};
use crate::threshold::{Polarity, adaptive_threshold};
use crate::types::PipelineConfig;
use crate::{blur, morphology, simplify};

/// Fewest vertices a tile outline may simplify to.
pub const MIN_VERTICES: usize = 5;

/// Most vertices a tile outline may simplify to.
pub const MAX_VERTICES: usize = 9;

/// A polygon that passed the shape filter, with the measurements later
/// stages need.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Simplified outline.
    pub polygon: Polygon,
    /// Area enclosed by the raw traced contour.
    pub contour_area: f64,
    /// Area enclosed by the simplified outline.
    pub area: f64,
    /// Area-weighted centroid of the simplified outline.
    pub centroid: PointF,
    /// Bounds of the simplified outline.
    pub bbox: BoundingBox,
}

/// Wall-clock time spent in each detection step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectionTimings {
    /// Gaussian blur.
    pub blur: Duration,
    /// Adaptive threshold.
    pub threshold: Duration,
    /// Morphological opening.
    pub opening: Duration,
    /// Outer contour tracing.
    pub contour_tracing: Duration,
    /// Simplification and shape filter.
    pub polygon_filter: Duration,
}

/// Every intermediate product of detection, for diagnostics.
#[derive(Debug, Clone)]
pub struct Detection {
    /// Blurred grayscale input.
    pub blurred: GrayImage,
    /// Thresholded image before morphology.
    pub binary: GrayImage,
    /// Thresholded image after opening.
    pub opened: GrayImage,
    /// Number of outer contours traced.
    pub contour_count: usize,
    /// Candidates that passed the shape filter, in tracing order.
    pub candidates: Vec<Candidate>,
    /// Per-step durations.
    pub timings: DetectionTimings,
}

/// Run the whole detection chain on a grayscale image.
#[must_use]
pub fn detect(gray: &GrayImage, config: &PipelineConfig) -> Detection {
    let (blurred, blur_time) = timed(|| blur::gaussian_blur(gray, config.blur_sigma));
    let (binary, threshold_time) = timed(|| binarize(&blurred, config));
    let (opened, opening_time) = timed(|| morphology::open(&binary, config.opening_radius));
    let (contours, tracing_time) = timed(|| config.contour_tracer.trace(&opened));
    let (candidates, filter_time) = timed(|| filter_candidates(&contours, config));
    Detection {
        blurred,
        binary,
        opened,
        contour_count: contours.len(),
        candidates,
        timings: DetectionTimings {
            blur: blur_time,
            threshold: threshold_time,
            opening: opening_time,
            contour_tracing: tracing_time,
            polygon_filter: filter_time,
        },
    }
}

/// Threshold a blurred image so bright tile faces become foreground.
#[must_use]
pub fn binarize(blurred: &GrayImage, config: &PipelineConfig) -> GrayImage {
    adaptive_threshold(
        blurred,
        config.detect_method,
        config.detect_block_size,
        config.detect_offset,
        Polarity::Bright,
    )
}

/// Keep the contours whose simplified outline looks like a tile.
#[must_use]
pub fn filter_candidates(contours: &[Vec<Point>], config: &PipelineConfig) -> Vec<Candidate> {
    contours
        .iter()
        .filter_map(|ring| candidate_from_contour(ring, config))
        .collect()
}

/// Apply the shape filter to one traced contour.
///
/// The area test uses the raw contour, the vertex and convexity tests use
/// the simplified outline.
#[must_use]
pub fn candidate_from_contour(ring: &[Point], config: &PipelineConfig) -> Option<Candidate> {
    let contour_area = ring_area(ring);
    if contour_area < config.min_area || contour_area > config.max_area {
        return None;
    }

    let polygon = Polygon::new(simplify::simplify_relative(ring, config.simplify_factor));
    if !(MIN_VERTICES..=MAX_VERTICES).contains(&polygon.vertex_count()) || !polygon.is_convex() {
        return None;
    }

    Some(Candidate {
        area: polygon.area(),
        centroid: polygon.centroid()?,
        bbox: polygon.bounding_box()?,
        polygon,
        contour_area,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Dark background with one bright tile whose top-left corner is cut.
    fn tile_photo(w: u32, h: u32, x0: u32, y0: u32, tw: u32, th: u32, cut: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            let inside = x >= x0 && x < x0 + tw && y >= y0 && y < y0 + th;
            if inside && (x - x0) + (y - y0) >= cut {
                image::Luma([220])
            } else {
                image::Luma([40])
            }
        })
    }

    #[test]
    fn finds_single_cut_corner_tile() {
        let img = tile_photo(360, 340, 100, 100, 120, 150, 25);
        let detection = detect(&img, &PipelineConfig::default());
        assert_eq!(detection.candidates.len(), 1);

        let c = &detection.candidates[0];
        assert!((MIN_VERTICES..=MAX_VERTICES).contains(&c.polygon.vertex_count()));
        assert!((c.centroid.x - 160.0).abs() < 5.0, "{:?}", c.centroid);
        assert!((c.centroid.y - 175.0).abs() < 5.0, "{:?}", c.centroid);
        assert!(c.bbox.x.abs_diff(100) <= 2 && c.bbox.y.abs_diff(100) <= 2);
    }

    #[test]
    fn uncut_rectangle_rejected_for_too_few_vertices() {
        let img = tile_photo(360, 340, 100, 100, 120, 150, 0);
        assert!(detect(&img, &PipelineConfig::default()).candidates.is_empty());
    }

    #[test]
    fn uniform_image_has_no_candidates() {
        let img = GrayImage::from_pixel(300, 300, image::Luma([128]));
        assert!(detect(&img, &PipelineConfig::default()).candidates.is_empty());
    }

    #[test]
    fn area_limits_apply_to_raw_contour() {
        let pentagon: Vec<Point> = [(5, 0), (40, 0), (40, 50), (0, 50), (0, 5)]
            .iter()
            .map(|&(x, y)| Point::new(x, y))
            .collect();
        let config = PipelineConfig::default();
        // 1987.5 px^2: inside the default window.
        assert!(candidate_from_contour(&pentagon, &config).is_some());

        let strict = PipelineConfig {
            min_area: 2500.0,
            ..PipelineConfig::default()
        };
        assert!(candidate_from_contour(&pentagon, &strict).is_none());
    }

    #[test]
    fn concave_outline_rejected() {
        let arrow: Vec<Point> = [(0, 0), (60, 0), (30, 20), (60, 60), (0, 60)]
            .iter()
            .map(|&(x, y)| Point::new(x, y))
            .collect();
        let config = PipelineConfig {
            simplify_factor: 0.0,
            ..PipelineConfig::default()
        };
        assert!(candidate_from_contour(&arrow, &config).is_none());
    }
}
