//! Shared types for the tactile recognition pipeline.

use serde::{Deserialize, Serialize};

use crate::alphabet::AlphabetError;
use crate::classify::GridLayout;
use crate::contour::ContourTracerKind;
use crate::diagnostics::Verbosity;
use crate::downsample::DownsampleFilter;
use crate::rectify::CornerStrategyKind;
use crate::threshold::AdaptiveMethod;

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate raster data without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage` for the annotated output.
pub use image::RgbImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Configuration for the recognition pipeline.
///
/// Pixel-valued thresholds (areas, distances) refer to the working
/// resolution, i.e. after the image has been normalized to at most
/// `working_width` pixels wide. Dot sizes refer to the canonical tile
/// width used by the classifier.
///
/// Missing fields deserialize to their defaults, so a JSON config may
/// name only the parameters it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// How much diagnostic imagery and logging the pipeline produces.
    pub verbosity: Verbosity,

    /// Images wider than this are downscaled to it before detection.
    pub working_width: u32,

    /// Resampling filter for the working-width downscale.
    pub downsample_filter: DownsampleFilter,

    /// Gaussian blur sigma applied before tile detection.
    pub blur_sigma: f32,

    /// Local statistic used by the detection threshold.
    pub detect_method: AdaptiveMethod,

    /// Neighbourhood side length for the detection threshold (odd, >= 3).
    pub detect_block_size: u32,

    /// Offset subtracted from the local statistic during detection.
    pub detect_offset: f32,

    /// Radius of the opening applied to the detection binary image.
    pub opening_radius: u8,

    /// Which contour tracing algorithm to use.
    pub contour_tracer: ContourTracerKind,

    /// Polygon simplification tolerance as a fraction of the contour
    /// perimeter.
    pub simplify_factor: f64,

    /// Smallest accepted contour area in square pixels.
    pub min_area: f64,

    /// Largest accepted contour area in square pixels.
    pub max_area: f64,

    /// Candidates whose centroids are closer than this (pixels) to a
    /// cluster pivot are treated as duplicates.
    pub dedup_distance: f64,

    /// How the four tile corners are picked from a polygon.
    pub corner_strategy: CornerStrategyKind,

    /// Expected height / width ratio of a tile.
    pub aspect_ratio: f64,

    /// Largest accepted deviation from `aspect_ratio`.
    pub aspect_tolerance: f64,

    /// Width the rectified tile is resized to before dot sampling.
    pub canonical_width: u32,

    /// Local statistic used by the dot threshold.
    pub classify_method: AdaptiveMethod,

    /// Neighbourhood side length for the dot threshold (odd, >= 3).
    pub classify_block_size: u32,

    /// Offset subtracted from the local statistic when finding dots.
    pub classify_offset: f32,

    /// Radius of the closing applied to the dot binary image.
    pub closing_radius: u8,

    /// Smallest accepted dot bounding-box side (canonical pixels).
    pub dot_min_size: u32,

    /// Largest accepted dot bounding-box side (canonical pixels).
    pub dot_max_size: u32,

    /// Positions and size of the six dot cells.
    pub grid: GridLayout,
}

impl PipelineConfig {
    /// Default working width in pixels.
    pub const DEFAULT_WORKING_WIDTH: u32 = 1500;

    /// Default working-width resampling filter.
    pub const DEFAULT_DOWNSAMPLE_FILTER: DownsampleFilter = DownsampleFilter::Triangle;

    /// Default Gaussian blur sigma.
    pub const DEFAULT_BLUR_SIGMA: f32 = 1.0;

    /// Default smallest contour area.
    pub const DEFAULT_MIN_AREA: f64 = 1000.0;

    /// Default largest contour area.
    pub const DEFAULT_MAX_AREA: f64 = 50_000.0;

    /// Default duplicate clustering distance.
    pub const DEFAULT_DEDUP_DISTANCE: f64 = 30.0;

    /// Default tile aspect ratio: 30 mm tall by 24 mm wide.
    pub const DEFAULT_ASPECT_RATIO: f64 = 30.0 / 24.0;

    /// Default aspect-ratio tolerance.
    pub const DEFAULT_ASPECT_TOLERANCE: f64 = 0.6;

    /// Default canonical tile width.
    pub const DEFAULT_CANONICAL_WIDTH: u32 = 60;

    /// Check every field for values the pipeline cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        fn invalid(msg: impl Into<String>) -> Result<(), PipelineError> {
            Err(PipelineError::InvalidConfig(msg.into()))
        }

        if self.working_width == 0 {
            return invalid("working_width must be positive");
        }
        if !self.blur_sigma.is_finite() {
            return invalid("blur_sigma must be finite");
        }
        for (name, block) in [
            ("detect_block_size", self.detect_block_size),
            ("classify_block_size", self.classify_block_size),
        ] {
            if block < 3 || block % 2 == 0 {
                return invalid(format!("{name} must be odd and at least 3, got {block}"));
            }
        }
        if !self.detect_offset.is_finite() || !self.classify_offset.is_finite() {
            return invalid("threshold offsets must be finite");
        }
        if !(self.simplify_factor.is_finite() && self.simplify_factor >= 0.0) {
            return invalid("simplify_factor must be non-negative");
        }
        if !(self.min_area >= 0.0 && self.min_area <= self.max_area) {
            return invalid(format!(
                "area range is empty: min_area={} max_area={}",
                self.min_area, self.max_area
            ));
        }
        if !(self.dedup_distance.is_finite() && self.dedup_distance >= 0.0) {
            return invalid("dedup_distance must be non-negative");
        }
        if !(self.aspect_ratio.is_finite() && self.aspect_ratio > 0.0) {
            return invalid("aspect_ratio must be positive");
        }
        if !(self.aspect_tolerance.is_finite() && self.aspect_tolerance >= 0.0) {
            return invalid("aspect_tolerance must be non-negative");
        }
        if self.canonical_width == 0 {
            return invalid("canonical_width must be positive");
        }
        if self.dot_min_size > self.dot_max_size {
            return invalid(format!(
                "dot size range is empty: dot_min_size={} dot_max_size={}",
                self.dot_min_size, self.dot_max_size
            ));
        }
        self.grid.validate().map_err(PipelineError::InvalidConfig)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            verbosity: Verbosity::default(),
            working_width: Self::DEFAULT_WORKING_WIDTH,
            downsample_filter: Self::DEFAULT_DOWNSAMPLE_FILTER,
            blur_sigma: Self::DEFAULT_BLUR_SIGMA,
            detect_method: AdaptiveMethod::Gaussian,
            detect_block_size: 3,
            detect_offset: 1.0,
            opening_radius: 1,
            contour_tracer: ContourTracerKind::default(),
            simplify_factor: 0.01,
            min_area: Self::DEFAULT_MIN_AREA,
            max_area: Self::DEFAULT_MAX_AREA,
            dedup_distance: Self::DEFAULT_DEDUP_DISTANCE,
            corner_strategy: CornerStrategyKind::default(),
            aspect_ratio: Self::DEFAULT_ASPECT_RATIO,
            aspect_tolerance: Self::DEFAULT_ASPECT_TOLERANCE,
            canonical_width: Self::DEFAULT_CANONICAL_WIDTH,
            classify_method: AdaptiveMethod::Gaussian,
            classify_block_size: 15,
            classify_offset: 5.0,
            closing_radius: 1,
            dot_min_size: 3,
            dot_max_size: 18,
            grid: GridLayout::default(),
        }
    }
}

/// Errors that can occur while building a recognizer or reading an image.
///
/// Tiles that fail rectification or match no letter are not errors; they
/// are reported in the [`Recognition`](crate::Recognition) itself.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// The alphabet table failed its integrity checks.
    #[error("invalid alphabet table: {0}")]
    Alphabet(#[from] AlphabetError),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn even_block_size_rejected() {
        let config = PipelineConfig {
            detect_block_size: 4,
            ..PipelineConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("detect_block_size"));
    }

    #[test]
    fn inverted_area_range_rejected() {
        let config = PipelineConfig {
            min_area: 500.0,
            max_area: 100.0,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"aspect_tolerance": 0.25, "min_area": 800.0}"#).unwrap();
        assert!((config.aspect_tolerance - 0.25).abs() < f64::EPSILON);
        assert!((config.min_area - 800.0).abs() < f64::EPSILON);
        assert_eq!(config.canonical_width, PipelineConfig::DEFAULT_CANONICAL_WIDTH);
    }

    #[test]
    fn config_json_round_trip() {
        let config = PipelineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
