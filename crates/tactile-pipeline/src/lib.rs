//! tactile-pipeline: Braille tile recognition (sans-IO).
//!
//! Reads photographs of embossed Braille tiles and turns each tile into a
//! dot pattern and a Cyrillic character:
//! downsample -> grayscale -> blur -> adaptive threshold -> opening ->
//! contour tracing -> polygon filter -> duplicate resolution ->
//! rectification -> dot-grid classification -> alphabet lookup.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! byte slices and decoded images and returns structured data. Debug
//! rasters leave through a [`DiagnosticSink`] supplied by the caller; all
//! filesystem interaction lives in the `tactile` binary.
//!
//! ```no_run
//! use tactile_pipeline::{PipelineConfig, Recognizer};
//!
//! # fn run(bytes: &[u8]) -> Result<(), tactile_pipeline::PipelineError> {
//! let recognizer = Recognizer::new(PipelineConfig::default())?;
//! let recognition = recognizer.process_bytes("photo.jpg", bytes)?;
//! println!("{}", recognition.text());
//! # Ok(())
//! # }
//! ```

pub mod alphabet;
pub mod annotate;
pub mod blur;
pub mod classify;
pub mod contour;
pub mod decode;
pub mod dedup;
pub mod detect;
pub mod diagnostics;
pub mod dots;
pub mod downsample;
pub mod geometry;
pub mod morphology;
pub mod pipeline;
pub mod rectify;
pub mod simplify;
pub mod threshold;
pub mod types;

pub use alphabet::{AlphabetError, AlphabetTable};
pub use classify::{Classification, GridLayout};
pub use contour::{ContourTracer, ContourTracerKind};
pub use detect::{Candidate, Detection, DetectionTimings};
pub use diagnostics::{DiagnosticSink, NullSink, RecognitionDiagnostics, Verbosity};
pub use dots::{BrailleDots, Dot, ParseDotsError};
pub use downsample::DownsampleFilter;
pub use geometry::{BoundingBox, Point, PointF, Polygon};
pub use pipeline::{
    BatchReport, BatchSummary, Recognition, RecognizedTile, Recognizer, RejectedCandidate,
    TileReport,
};
pub use rectify::{CornerStrategy, CornerStrategyKind, Quad, RectifiedTile, Rejection};
pub use threshold::{AdaptiveMethod, Polarity};
pub use types::{Dimensions, GrayImage, PipelineConfig, PipelineError, RgbImage};
