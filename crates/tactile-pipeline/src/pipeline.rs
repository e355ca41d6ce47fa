//! Recognition orchestration.
//!
//! A [`Recognizer`] owns a validated configuration, the alphabet table and
//! a diagnostic sink. [`Recognizer::process_image`] runs one photograph
//! through every stage; [`Recognizer::process_batch`] runs many and keeps
//! going when one of them cannot be decoded.
//!
//! With the `parallel` feature (on by default) tiles of one image, and the
//! images of a batch, are processed on the rayon thread pool. Results are
//! always assembled in reading order, never in completion order.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use image::DynamicImage;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::alphabet::AlphabetTable;
use crate::annotate;
use crate::classify::classify;
use crate::decode::decode;
use crate::dedup::resolve_duplicates;
use crate::detect::{Candidate, Detection, detect};
use crate::diagnostics::{
    DiagnosticSink, NullSink, RecognitionDiagnostics, RecognitionSummary, StageDiagnostics,
    StageMetrics, Verbosity, count_foreground, timed,
};
use crate::dots::BrailleDots;
use crate::downsample::normalize_width;
use crate::geometry::BoundingBox;
use crate::rectify::{RectifiedTile, Rejection, rectify};
use crate::types::{Dimensions, PipelineConfig, PipelineError, RgbImage};

/// A rectified tile with the dots read from it.
#[derive(Debug, Clone)]
pub struct RecognizedTile {
    /// The upright tile and its source geometry.
    pub tile: RectifiedTile,
    /// Raised dots found on the tile.
    pub dots: BrailleDots,
    /// The character for `dots`, or `None` if the pattern is not in the
    /// alphabet.
    pub character: Option<char>,
}

impl RecognizedTile {
    /// Position in reading order.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.tile.index
    }

    /// Serializable summary of this tile.
    #[must_use]
    pub const fn report(&self) -> TileReport {
        TileReport {
            index: self.tile.index,
            dots: self.dots,
            character: self.character,
            bbox: self.tile.bbox,
        }
    }
}

/// A candidate the rectifier turned down.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RejectedCandidate {
    /// Position in reading order.
    pub index: usize,
    /// Bounds of the outline in the working image.
    pub bbox: BoundingBox,
    /// Why it was rejected.
    pub reason: Rejection,
}

/// Serializable per-tile result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileReport {
    /// Position in reading order.
    pub index: usize,
    /// Dot pattern as an `F`/`E` flag string.
    pub dots: BrailleDots,
    /// The recognized character, if any.
    pub character: Option<char>,
    /// Bounds in the working image.
    pub bbox: BoundingBox,
}

/// Everything recognized in one image.
#[derive(Debug, Clone)]
pub struct Recognition {
    /// Rectified tiles in reading order.
    pub tiles: Vec<RecognizedTile>,
    /// Candidates that could not be rectified, in reading order.
    pub rejected: Vec<RejectedCandidate>,
    /// Size of the image as supplied.
    pub source_dimensions: Dimensions,
    /// Size of the working image all coordinates refer to.
    pub dimensions: Dimensions,
    /// The working image with outlines and dot glyphs drawn on it.
    pub annotated: RgbImage,
    /// Per-stage timing and counts.
    pub diagnostics: RecognitionDiagnostics,
}

impl Recognition {
    /// The recognized characters in reading order, `?` for unknown
    /// patterns.
    #[must_use]
    pub fn text(&self) -> String {
        self.tiles
            .iter()
            .map(|t| t.character.unwrap_or('?'))
            .collect()
    }

    /// One serializable entry per tile, in reading order.
    #[must_use]
    pub fn reports(&self) -> Vec<TileReport> {
        self.tiles.iter().map(RecognizedTile::report).collect()
    }

    /// Tiles read as a known character.
    #[must_use]
    pub fn recognized_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.character.is_some()).count()
    }

    /// Tiles whose pattern is not in the alphabet.
    #[must_use]
    pub fn unknown_count(&self) -> usize {
        self.tiles.len() - self.recognized_count()
    }
}

/// Totals across a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Images that went through recognition.
    pub images_processed: usize,
    /// Images that could not be read or decoded.
    pub images_failed: usize,
    /// Tiles read as a known character.
    pub tiles_recognized: usize,
    /// Tiles whose pattern is not in the alphabet.
    pub tiles_unknown: usize,
    /// Candidates the rectifier rejected.
    pub tiles_rejected: usize,
}

impl BatchSummary {
    /// Add one image outcome to the totals.
    pub fn record(&mut self, outcome: &Result<Recognition, PipelineError>) {
        match outcome {
            Ok(recognition) => {
                self.images_processed += 1;
                self.tiles_recognized += recognition.recognized_count();
                self.tiles_unknown += recognition.unknown_count();
                self.tiles_rejected += recognition.rejected.len();
            }
            Err(_) => self.images_failed += 1,
        }
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} images processed, {} failed; tiles: {} recognized, {} unknown, {} rejected",
            self.images_processed,
            self.images_failed,
            self.tiles_recognized,
            self.tiles_unknown,
            self.tiles_rejected,
        )
    }
}

/// Outcome of [`Recognizer::process_batch`].
#[derive(Debug)]
pub struct BatchReport {
    /// `(label, outcome)` per input, in input order.
    pub outcomes: Vec<(String, Result<Recognition, PipelineError>)>,
    /// Totals across all inputs.
    pub summary: BatchSummary,
}

/// Reads Braille tiles out of photographs.
///
/// Cheap to share across threads: the alphabet and sink are reference
/// counted and never mutated.
#[derive(Clone)]
pub struct Recognizer {
    config: PipelineConfig,
    alphabet: Arc<AlphabetTable>,
    sink: Arc<dyn DiagnosticSink>,
}

impl fmt::Debug for Recognizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recognizer")
            .field("config", &self.config)
            .field("alphabet_len", &self.alphabet.len())
            .finish_non_exhaustive()
    }
}

impl Recognizer {
    /// Build a recognizer with the Russian alphabet and no diagnostic
    /// sink.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `config` fails
    /// validation, or [`PipelineError::Alphabet`] if the built-in table is
    /// inconsistent.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            config,
            alphabet: Arc::new(AlphabetTable::russian()?),
            sink: Arc::new(NullSink),
        })
    }

    /// Use `alphabet` instead of the built-in table.
    #[must_use]
    pub fn with_alphabet(mut self, alphabet: impl Into<Arc<AlphabetTable>>) -> Self {
        self.alphabet = alphabet.into();
        self
    }

    /// Send debug rasters to `sink`.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    /// The validated configuration.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The alphabet used for lookup.
    #[must_use]
    pub fn alphabet(&self) -> &AlphabetTable {
        &self.alphabet
    }

    /// Decode `bytes` and recognize the tiles in it.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyInput`] for empty input and
    /// [`PipelineError::ImageDecode`] when the format is not recognized.
    pub fn process_bytes(&self, label: &str, bytes: &[u8]) -> Result<Recognition, PipelineError> {
        let image = decode(bytes)?;
        Ok(self.process_image(label, &image))
    }

    /// Recognize the tiles in an already decoded image.
    ///
    /// `label` names the image in log lines and sink output. An image with
    /// no tiles gives an empty [`Recognition`], not an error.
    #[allow(clippy::too_many_lines)]
    #[must_use]
    pub fn process_image(&self, label: &str, image: &DynamicImage) -> Recognition {
        let start = Instant::now();
        let config = &self.config;

        // 1. Working resolution and grayscale.
        let ((working, applied), downsample_time) =
            timed(|| normalize_width(image, config.working_width, config.downsample_filter));
        let gray = working.to_luma8();
        let dimensions = Dimensions {
            width: gray.width(),
            height: gray.height(),
        };

        // 2-6. Blur, threshold, opening, contours, shape filter.
        let Detection {
            blurred,
            binary,
            opened,
            contour_count,
            candidates,
            timings,
        } = detect(&gray, config);
        let candidate_total = candidates.len();

        // 7. Duplicates, then reading order.
        let (mut candidates, dedup_time) =
            timed(|| resolve_duplicates(&candidates, config.dedup_distance));
        candidates.sort_by_key(|c| (c.bbox.x, c.bbox.y));

        // 8. Per tile.
        let (outcomes, tiles_time) = timed(|| self.recognize_tiles(label, &gray, &candidates));
        let mut tiles = Vec::new();
        let mut rejected = Vec::new();
        for (candidate, outcome) in candidates.iter().zip(outcomes) {
            match outcome {
                Ok(tile) => tiles.push(tile),
                Err((index, reason)) => rejected.push(RejectedCandidate {
                    index,
                    bbox: candidate.bbox,
                    reason,
                }),
            }
        }

        let rejected_polygons: Vec<_> = rejected
            .iter()
            .map(|r| &candidates[r.index].polygon)
            .collect();
        let annotated = annotate::annotate(&working.to_rgb8(), &tiles, &rejected_polygons);

        self.emit(label, Verbosity::Basic, "annotated", || {
            DynamicImage::ImageRgb8(annotated.clone())
        });
        self.emit(label, Verbosity::Basic, "contours", || {
            DynamicImage::ImageRgb8(annotate::candidate_overlay(&opened, &candidates))
        });
        self.emit(label, Verbosity::Detailed, "blurred", || {
            DynamicImage::ImageLuma8(blurred.clone())
        });
        self.emit(label, Verbosity::Detailed, "binary", || {
            DynamicImage::ImageLuma8(binary.clone())
        });
        self.emit(label, Verbosity::Detailed, "opened", || {
            DynamicImage::ImageLuma8(opened.clone())
        });

        let recognized = tiles.iter().filter(|t| t.character.is_some()).count();
        let unknown = tiles.len() - recognized;
        let total_pixels = u64::from(dimensions.width) * u64::from(dimensions.height);
        let diagnostics = RecognitionDiagnostics {
            downsample: StageDiagnostics {
                duration: downsample_time,
                metrics: StageMetrics::Downsample {
                    source_width: image.width(),
                    source_height: image.height(),
                    width: dimensions.width,
                    height: dimensions.height,
                    applied,
                },
            },
            blur: StageDiagnostics {
                duration: timings.blur,
                metrics: StageMetrics::Blur {
                    sigma: config.blur_sigma,
                },
            },
            threshold: StageDiagnostics {
                duration: timings.threshold,
                metrics: StageMetrics::Threshold {
                    block_size: config.detect_block_size,
                    offset: config.detect_offset,
                    foreground_pixels: count_foreground(&binary),
                    total_pixels,
                },
            },
            opening: StageDiagnostics {
                duration: timings.opening,
                metrics: StageMetrics::Opening {
                    radius: config.opening_radius,
                    foreground_pixels: count_foreground(&opened),
                },
            },
            contour_tracing: StageDiagnostics {
                duration: timings.contour_tracing,
                metrics: StageMetrics::ContourTracing {
                    contour_count,
                },
            },
            polygon_filter: StageDiagnostics {
                duration: timings.polygon_filter,
                metrics: StageMetrics::PolygonFilter {
                    simplify_factor: config.simplify_factor,
                    candidate_count: candidate_total,
                },
            },
            dedup: StageDiagnostics {
                duration: dedup_time,
                metrics: StageMetrics::Dedup {
                    distance: config.dedup_distance,
                    before: candidate_total,
                    after: candidates.len(),
                },
            },
            tiles: StageDiagnostics {
                duration: tiles_time,
                metrics: StageMetrics::Tiles {
                    recognized,
                    unknown,
                    rejected: rejected.len(),
                },
            },
            total_duration: start.elapsed(),
            summary: RecognitionSummary {
                image_width: dimensions.width,
                image_height: dimensions.height,
                candidate_count: candidates.len(),
                recognized_count: recognized,
                unknown_count: unknown,
                rejected_count: rejected.len(),
            },
        };

        let recognition = Recognition {
            tiles,
            rejected,
            source_dimensions: Dimensions {
                width: image.width(),
                height: image.height(),
            },
            dimensions,
            annotated,
            diagnostics,
        };
        log::info!(
            "{label}: {} tiles ({} unknown, {} rejected) {:?} in {:.1}ms",
            recognition.tiles.len(),
            unknown,
            recognition.rejected.len(),
            recognition.text(),
            recognition.diagnostics.total_duration.as_secs_f64() * 1000.0,
        );
        recognition
    }

    /// Recognize many named inputs. A failed input is logged and counted;
    /// it never stops the others.
    pub fn process_batch<L, B>(&self, inputs: &[(L, B)]) -> BatchReport
    where
        L: AsRef<str> + Sync,
        B: AsRef<[u8]> + Sync,
    {
        let run = |(label, bytes): &(L, B)| {
            let label = label.as_ref();
            let outcome = self.process_bytes(label, bytes.as_ref());
            if let Err(e) = &outcome {
                log::warn!("{label}: {e}");
            }
            (label.to_owned(), outcome)
        };

        #[cfg(feature = "parallel")]
        let outcomes: Vec<_> = inputs.par_iter().map(run).collect();
        #[cfg(not(feature = "parallel"))]
        let outcomes: Vec<_> = inputs.iter().map(run).collect();

        let mut summary = BatchSummary::default();
        for (_, outcome) in &outcomes {
            summary.record(outcome);
        }
        BatchReport { outcomes, summary }
    }

    /// Rectify, classify and look up every candidate. Output order matches
    /// `candidates`; the index of each is its position there.
    fn recognize_tiles(
        &self,
        label: &str,
        gray: &image::GrayImage,
        candidates: &[Candidate],
    ) -> Vec<Result<RecognizedTile, (usize, Rejection)>> {
        let run = |(index, candidate): (usize, &Candidate)| {
            self.recognize_tile(label, gray, candidate, index)
                .map_err(|reason| (index, reason))
        };

        #[cfg(feature = "parallel")]
        {
            candidates.par_iter().enumerate().map(run).collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            candidates.iter().enumerate().map(run).collect()
        }
    }

    fn recognize_tile(
        &self,
        label: &str,
        gray: &image::GrayImage,
        candidate: &Candidate,
        index: usize,
    ) -> Result<RecognizedTile, Rejection> {
        let tile = rectify(gray, candidate, index, &self.config).inspect_err(|reason| {
            log::debug!("{label}: candidate {index} rejected: {reason}");
        })?;
        let classification = classify(&tile.image, &self.config);
        let character = self.alphabet.lookup(classification.dots);
        log::debug!(
            "{label}: tile {index} at ({}, {}) is {} -> {}",
            tile.bbox.x,
            tile.bbox.y,
            classification.dots,
            character.map_or_else(|| "unknown".to_owned(), String::from),
        );

        let stage = |name: &str| format!("tile{index:02}_{name}");
        self.emit(label, Verbosity::Detailed, &stage("rectified"), || {
            DynamicImage::ImageLuma8(tile.image.clone())
        });
        self.emit(label, Verbosity::Detailed, &stage("closed"), || {
            DynamicImage::ImageLuma8(classification.closed.clone())
        });
        self.emit(label, Verbosity::Detailed, &stage("boxes"), || {
            let (w, h) = classification.canonical.dimensions();
            let cells = self.config.grid.cells(w, h);
            DynamicImage::ImageRgb8(annotate::blob_overlay(
                &classification.canonical,
                &classification.blobs,
                &cells,
            ))
        });

        Ok(RecognizedTile {
            tile,
            dots: classification.dots,
            character,
        })
    }

    /// Hand a raster to the sink when the configured verbosity reaches
    /// `level`. The raster is only built if it will be used.
    fn emit(
        &self,
        label: &str,
        level: Verbosity,
        stage: &str,
        image: impl FnOnce() -> DynamicImage,
    ) {
        if self.config.verbosity >= level {
            self.sink.emit(label, stage, &image());
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::alphabet::AlphabetTable;

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<String>>);

    impl DiagnosticSink for RecordingSink {
        fn emit(&self, label: &str, stage: &str, _image: &DynamicImage) {
            self.0.lock().unwrap().push(format!("{label}/{stage}"));
        }
    }

    fn blank(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(image::GrayImage::from_pixel(width, height, image::Luma([90])))
    }

    #[test]
    fn invalid_config_is_refused() {
        let config = PipelineConfig {
            canonical_width: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            Recognizer::new(config),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn blank_image_gives_empty_recognition() {
        let recognizer = Recognizer::new(PipelineConfig::default()).unwrap();
        let result = recognizer.process_image("blank", &blank(200, 100));
        assert!(result.tiles.is_empty());
        assert!(result.rejected.is_empty());
        assert_eq!(result.text(), "");
        assert_eq!(result.annotated.dimensions(), (200, 100));
    }

    #[test]
    fn wide_image_is_normalized() {
        let config = PipelineConfig {
            working_width: 100,
            ..PipelineConfig::default()
        };
        let recognizer = Recognizer::new(config).unwrap();
        let result = recognizer.process_image("wide", &blank(400, 200));
        assert_eq!(result.dimensions, Dimensions { width: 100, height: 50 });
        assert_eq!(result.source_dimensions.width, 400);
    }

    #[test]
    fn sink_respects_verbosity() {
        let sink = Arc::new(RecordingSink::default());
        let quiet = Recognizer::new(PipelineConfig::default())
            .unwrap()
            .with_sink(sink.clone());
        let _ = quiet.process_image("a", &blank(50, 50));
        assert!(sink.0.lock().unwrap().is_empty());

        let basic = Recognizer::new(PipelineConfig {
            verbosity: Verbosity::Basic,
            ..PipelineConfig::default()
        })
        .unwrap()
        .with_sink(sink.clone());
        let _ = basic.process_image("b", &blank(50, 50));
        assert_eq!(*sink.0.lock().unwrap(), vec!["b/annotated", "b/contours"]);

        let detailed = Recognizer::new(PipelineConfig {
            verbosity: Verbosity::Detailed,
            ..PipelineConfig::default()
        })
        .unwrap()
        .with_sink(sink.clone());
        let _ = detailed.process_image("c", &blank(50, 50));
        assert!(sink.0.lock().unwrap().contains(&"c/opened".to_owned()));
    }

    /// One blank 120x150 tile with its top-left corner cut, at (100, 100).
    fn cut_tile() -> image::GrayImage {
        image::GrayImage::from_fn(360, 340, |x, y| {
            let inside = (100..220).contains(&x) && (100..250).contains(&y);
            image::Luma([if inside && x + y >= 225 { 220 } else { 40 }])
        })
    }

    #[test]
    fn per_tile_stages_are_named_by_index() {
        let sink = Arc::new(RecordingSink::default());
        let recognizer = Recognizer::new(PipelineConfig {
            verbosity: Verbosity::Detailed,
            ..PipelineConfig::default()
        })
        .unwrap()
        .with_sink(sink.clone());
        let _ = recognizer.process_image("t", &DynamicImage::ImageLuma8(cut_tile()));

        let stages = sink.0.lock().unwrap();
        for name in ["t/tile00_rectified", "t/tile00_closed", "t/tile00_boxes"] {
            assert!(stages.iter().any(|s| s == name), "{name} missing from {stages:?}");
        }
    }

    #[test]
    fn diagnostics_come_from_detection() {
        let gray = cut_tile();
        let config = PipelineConfig::default();
        let detection = detect(&gray, &config);
        let result = Recognizer::new(config)
            .unwrap()
            .process_image("tile", &DynamicImage::ImageLuma8(gray));

        let d = &result.diagnostics;
        assert!(matches!(
            d.contour_tracing.metrics,
            StageMetrics::ContourTracing { contour_count } if contour_count == detection.contour_count
        ));
        assert!(matches!(
            d.polygon_filter.metrics,
            StageMetrics::PolygonFilter { candidate_count, .. } if candidate_count == detection.candidates.len()
        ));
        assert_eq!(detection.candidates.len(), 1);
        assert_eq!(result.tiles.len(), 1);
    }

    #[test]
    fn custom_alphabet_is_used() {
        let table = AlphabetTable::from_numbers(&[('x', "1")]).unwrap();
        let recognizer = Recognizer::new(PipelineConfig::default())
            .unwrap()
            .with_alphabet(table);
        assert_eq!(recognizer.alphabet().len(), 1);
    }

    #[test]
    fn batch_counts_failures() {
        let recognizer = Recognizer::new(PipelineConfig::default()).unwrap();
        let inputs: Vec<(String, Vec<u8>)> = vec![
            ("empty".into(), Vec::new()),
            ("garbage".into(), b"not an image".to_vec()),
        ];
        let report = recognizer.process_batch(&inputs);
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.outcomes[0].0, "empty");
        assert_eq!(report.summary.images_failed, 2);
        assert_eq!(report.summary.images_processed, 0);
    }

    #[test]
    fn summary_display() {
        let summary = BatchSummary {
            images_processed: 3,
            images_failed: 1,
            tiles_recognized: 7,
            tiles_unknown: 2,
            tiles_rejected: 4,
        };
        assert_eq!(
            summary.to_string(),
            "3 images processed, 1 failed; tiles: 7 recognized, 2 unknown, 4 rejected"
        );
    }
}
