//! Recognition diagnostics: timing, counts, and debug imagery per stage.
//!
//! Every call to [`Recognizer::process_image`](crate::Recognizer::process_image)
//! collects a [`RecognitionDiagnostics`] alongside its results. Debug
//! rasters are handed to a [`DiagnosticSink`] when the configured
//! [`Verbosity`] asks for them; the pipeline itself never touches the
//! filesystem.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::{Duration, Instant};

use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// How much the pipeline reports about its own work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Verbosity {
    /// Results only; warnings are still logged.
    #[default]
    Off,
    /// Per-image progress, plus the annotated image and contour overlay.
    Basic,
    /// Per-tile progress and every intermediate raster.
    Detailed,
}

impl Verbosity {
    /// The log level a binary should enable for this verbosity.
    #[must_use]
    pub const fn log_level(self) -> log::LevelFilter {
        match self {
            Self::Off => log::LevelFilter::Warn,
            Self::Basic => log::LevelFilter::Info,
            Self::Detailed => log::LevelFilter::Debug,
        }
    }

    /// Verbosity from a repeat count such as `-vv`.
    #[must_use]
    pub const fn from_count(count: u8) -> Self {
        match count {
            0 => Self::Off,
            1 => Self::Basic,
            _ => Self::Detailed,
        }
    }
}

/// Receiver for debug rasters.
///
/// `label` names the source image and `stage` the step, e.g.
/// `"tile03_closed"`. Implementations must not panic and must absorb
/// their own failures; a sink error never aborts recognition.
pub trait DiagnosticSink: Send + Sync {
    /// Accept one debug raster.
    fn emit(&self, label: &str, stage: &str, image: &DynamicImage);
}

/// A sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn emit(&self, _label: &str, _stage: &str, _image: &DynamicImage) {}
}

/// Diagnostics collected from recognizing a single image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionDiagnostics {
    /// Stage 1: working-width normalization.
    pub downsample: StageDiagnostics,
    /// Stage 2: Gaussian blur.
    pub blur: StageDiagnostics,
    /// Stage 3: adaptive threshold.
    pub threshold: StageDiagnostics,
    /// Stage 4: morphological opening.
    pub opening: StageDiagnostics,
    /// Stage 5: contour tracing.
    pub contour_tracing: StageDiagnostics,
    /// Stage 6: simplification and shape filter.
    pub polygon_filter: StageDiagnostics,
    /// Stage 7: duplicate resolution.
    pub dedup: StageDiagnostics,
    /// Stage 8: rectification, classification and lookup of every tile.
    pub tiles: StageDiagnostics,
    /// Total wall-clock duration of the image (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: RecognitionSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Working-width normalization.
    Downsample {
        /// Source width in pixels.
        source_width: u32,
        /// Source height in pixels.
        source_height: u32,
        /// Working width in pixels.
        width: u32,
        /// Working height in pixels.
        height: u32,
        /// Whether the image was resized.
        applied: bool,
    },
    /// Gaussian blur.
    Blur {
        /// Sigma value used for the blur kernel.
        sigma: f32,
    },
    /// Adaptive threshold.
    Threshold {
        /// Neighbourhood side length.
        block_size: u32,
        /// Offset from the local statistic.
        offset: f32,
        /// Foreground pixels in the output.
        foreground_pixels: u64,
        /// Total pixel count.
        total_pixels: u64,
    },
    /// Morphological opening.
    Opening {
        /// Kernel radius.
        radius: u8,
        /// Foreground pixels remaining.
        foreground_pixels: u64,
    },
    /// Contour tracing.
    ContourTracing {
        /// Outer contours found.
        contour_count: usize,
    },
    /// Simplification and shape filter.
    PolygonFilter {
        /// Tolerance as a fraction of each contour's perimeter.
        simplify_factor: f64,
        /// Contours that passed.
        candidate_count: usize,
    },
    /// Duplicate resolution.
    Dedup {
        /// Clustering distance in pixels.
        distance: f64,
        /// Candidates before.
        before: usize,
        /// Candidates after.
        after: usize,
    },
    /// Per-tile work.
    Tiles {
        /// Tiles that rectified and classified to a known character.
        recognized: usize,
        /// Tiles that rectified but matched no character.
        unknown: usize,
        /// Candidates rejected by the rectifier.
        rejected: usize,
    },
}

/// High-level summary counts for one image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionSummary {
    /// Working image width in pixels.
    pub image_width: u32,
    /// Working image height in pixels.
    pub image_height: u32,
    /// Candidates after duplicate resolution.
    pub candidate_count: usize,
    /// Tiles with a known character.
    pub recognized_count: usize,
    /// Tiles with an unknown pattern.
    pub unknown_count: usize,
    /// Candidates rejected by the rectifier.
    pub rejected_count: usize,
}

impl RecognitionDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Recognition Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Working image: {}x{}",
            self.summary.image_width, self.summary.image_height,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        let stages = [
            ("Downsample", &self.downsample),
            ("Blur", &self.blur),
            ("Threshold", &self.threshold),
            ("Opening", &self.opening),
            ("Contour Tracing", &self.contour_tracing),
            ("Polygon Filter", &self.polygon_filter),
            ("Dedup", &self.dedup),
            ("Tiles", &self.tiles),
        ];

        for (name, diag) in &stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Candidates: {}  |  Recognized: {}  |  Unknown: {}  |  Rejected: {}",
            self.summary.candidate_count,
            self.summary.recognized_count,
            self.summary.unknown_count,
            self.summary.rejected_count,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Downsample {
            source_width,
            source_height,
            width,
            height,
            applied,
        } => {
            if *applied {
                format!("{source_width}x{source_height} -> {width}x{height}")
            } else {
                format!("{width}x{height} (unchanged)")
            }
        }
        StageMetrics::Blur { sigma } => format!("sigma={sigma:.2}"),
        StageMetrics::Threshold {
            block_size,
            offset,
            foreground_pixels,
            total_pixels,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *total_pixels > 0 {
                *foreground_pixels as f64 / *total_pixels as f64 * 100.0
            } else {
                0.0
            };
            format!("block={block_size} offset={offset:.1} foreground={foreground_pixels} ({density:.1}%)")
        }
        StageMetrics::Opening {
            radius,
            foreground_pixels,
        } => format!("radius={radius} foreground={foreground_pixels}"),
        StageMetrics::ContourTracing { contour_count } => format!("{contour_count} contours"),
        StageMetrics::PolygonFilter {
            simplify_factor,
            candidate_count,
        } => format!("factor={simplify_factor:.3} {candidate_count} candidates"),
        StageMetrics::Dedup {
            distance,
            before,
            after,
        } => format!("distance={distance:.1}px {before}->{after}"),
        StageMetrics::Tiles {
            recognized,
            unknown,
            rejected,
        } => format!("recognized={recognized} unknown={unknown} rejected={rejected}"),
    }
}

/// Run `f`, returning its value and how long it took.
pub(crate) fn timed<T>(f: impl FnOnce() -> T) -> (T, Duration) {
    let start = Instant::now();
    let value = f();
    (value, start.elapsed())
}

/// Count foreground (non-zero) pixels in a binary image.
pub(crate) fn count_foreground(image: &image::GrayImage) -> u64 {
    image.pixels().map(|p| u64::from(p.0[0] != 0)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(ms: u64, metrics: StageMetrics) -> StageDiagnostics {
        StageDiagnostics {
            duration: Duration::from_millis(ms),
            metrics,
        }
    }

    fn sample() -> RecognitionDiagnostics {
        RecognitionDiagnostics {
            downsample: stage(
                4,
                StageMetrics::Downsample {
                    source_width: 3000,
                    source_height: 2000,
                    width: 1500,
                    height: 1000,
                    applied: true,
                },
            ),
            blur: stage(3, StageMetrics::Blur { sigma: 1.0 }),
            threshold: stage(
                5,
                StageMetrics::Threshold {
                    block_size: 3,
                    offset: 1.0,
                    foreground_pixels: 900_000,
                    total_pixels: 1_500_000,
                },
            ),
            opening: stage(
                2,
                StageMetrics::Opening {
                    radius: 1,
                    foreground_pixels: 880_000,
                },
            ),
            contour_tracing: stage(6, StageMetrics::ContourTracing { contour_count: 412 }),
            polygon_filter: stage(
                1,
                StageMetrics::PolygonFilter {
                    simplify_factor: 0.01,
                    candidate_count: 7,
                },
            ),
            dedup: stage(
                0,
                StageMetrics::Dedup {
                    distance: 30.0,
                    before: 7,
                    after: 5,
                },
            ),
            tiles: stage(
                9,
                StageMetrics::Tiles {
                    recognized: 4,
                    unknown: 0,
                    rejected: 1,
                },
            ),
            total_duration: Duration::from_millis(30),
            summary: RecognitionSummary {
                image_width: 1500,
                image_height: 1000,
                candidate_count: 5,
                recognized_count: 4,
                unknown_count: 0,
                rejected_count: 1,
            },
        }
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let ms = duration_ms(Duration::from_millis(1234));
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn count_foreground_counts_nonzero() {
        let mut img = image::GrayImage::new(10, 10);
        for i in 0..5 {
            img.put_pixel(i, 0, image::Luma([255]));
        }
        assert_eq!(count_foreground(&img), 5);
    }

    #[test]
    fn verbosity_ordering_and_levels() {
        assert!(Verbosity::Off < Verbosity::Basic && Verbosity::Basic < Verbosity::Detailed);
        assert_eq!(Verbosity::from_count(0), Verbosity::Off);
        assert_eq!(Verbosity::from_count(5), Verbosity::Detailed);
        assert_eq!(Verbosity::Basic.log_level(), log::LevelFilter::Info);
    }

    #[test]
    fn report_lists_every_stage() {
        let report = sample().report();
        assert!(report.contains("Recognition Diagnostics Report"));
        assert!(report.contains("3000x2000 -> 1500x1000"));
        assert!(report.contains("Contour Tracing"));
        assert!(report.contains("Rejected: 1"));
    }

    #[test]
    fn durations_serialize_as_seconds() {
        let json = serde_json::to_value(sample()).unwrap_or_default();
        assert!((json["total_duration"].as_f64().unwrap_or(0.0) - 0.03).abs() < 1e-9);
    }
}
