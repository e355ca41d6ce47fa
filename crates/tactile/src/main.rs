//! tactile: batch recognizer for photographed Braille tiles.
//!
//! Reads every image named on the command line (directories are walked
//! recursively), recognizes the tiles in each, and prints the dot
//! patterns and the text they spell.
//!
//! # Usage
//!
//! ```text
//! tactile [OPTIONS] <PATH>...
//! tactile -vv --out debug/ photos/
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{ArgAction, Parser, ValueEnum};
use image::{DynamicImage, ImageFormat};
use serde::Serialize;
use tactile_pipeline::{
    BatchSummary, DiagnosticSink, DownsampleFilter, PipelineConfig, Recognition, Recognizer,
    TileReport, Verbosity,
};

/// File extensions treated as images when walking directories.
const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "webp", "jfif"];

/// Recognize Braille tiles in photographs and print them as Cyrillic text.
#[derive(Parser)]
#[command(name = "tactile", version)]
struct Cli {
    /// Image files or directories to scan.
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Increase verbosity (-v progress and annotated images, -vv every stage).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Directory for annotated and diagnostic images.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Width photographs are scaled down to before detection.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_WORKING_WIDTH, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    working_width: u32,

    /// Downsample filter.
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_FILTER)]
    downsample_filter: Filter,

    /// Gaussian blur sigma.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_BLUR_SIGMA)]
    blur_sigma: f32,

    /// Smallest tile contour area in square pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MIN_AREA)]
    min_area: f64,

    /// Largest tile contour area in square pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MAX_AREA)]
    max_area: f64,

    /// Centroid distance under which candidates count as duplicates.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_DEDUP_DISTANCE)]
    dedup_distance: f64,

    /// Allowed deviation of height/width from the tile proportions.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_ASPECT_TOLERANCE)]
    aspect_tolerance: f64,

    /// Width rectified tiles are resized to before dot detection.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CANONICAL_WIDTH, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    canonical_width: u32,

    /// Print results as JSON.
    #[arg(long)]
    json: bool,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other tuning flags are ignored. `-v` still
    /// raises the verbosity.
    #[arg(long)]
    config_json: Option<String>,
}

/// Downsample resampling filter selection.
#[derive(Clone, Copy, ValueEnum)]
enum Filter {
    /// Never downsample.
    #[value(name = "none")]
    Disabled,
    /// Nearest-neighbor.
    Nearest,
    /// Bilinear.
    Triangle,
    /// Bicubic Catmull-Rom.
    CatmullRom,
    /// Gaussian.
    Gaussian,
    /// Lanczos with 3 lobes.
    Lanczos3,
}

const fn filter_from_pipeline(f: DownsampleFilter) -> Filter {
    match f {
        DownsampleFilter::None => Filter::Disabled,
        DownsampleFilter::Nearest => Filter::Nearest,
        DownsampleFilter::Triangle => Filter::Triangle,
        DownsampleFilter::CatmullRom => Filter::CatmullRom,
        DownsampleFilter::Gaussian => Filter::Gaussian,
        DownsampleFilter::Lanczos3 => Filter::Lanczos3,
    }
}

const fn filter_to_pipeline(f: Filter) -> DownsampleFilter {
    match f {
        Filter::Disabled => DownsampleFilter::None,
        Filter::Nearest => DownsampleFilter::Nearest,
        Filter::Triangle => DownsampleFilter::Triangle,
        Filter::CatmullRom => DownsampleFilter::CatmullRom,
        Filter::Gaussian => DownsampleFilter::Gaussian,
        Filter::Lanczos3 => DownsampleFilter::Lanczos3,
    }
}

const CLI_DEFAULT_FILTER: Filter = filter_from_pipeline(PipelineConfig::DEFAULT_DOWNSAMPLE_FILTER);

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// `--config-json` replaces every tuning flag; `-v` is applied on top
/// when it asks for more than the JSON does.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    let requested = Verbosity::from_count(cli.verbose);

    if let Some(ref json) = cli.config_json {
        let mut config: PipelineConfig =
            serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"))?;
        config.verbosity = config.verbosity.max(requested);
        return Ok(config);
    }

    Ok(PipelineConfig {
        verbosity: requested,
        working_width: cli.working_width,
        downsample_filter: filter_to_pipeline(cli.downsample_filter),
        blur_sigma: cli.blur_sigma,
        min_area: cli.min_area,
        max_area: cli.max_area,
        dedup_distance: cli.dedup_distance,
        aspect_tolerance: cli.aspect_tolerance,
        canonical_width: cli.canonical_width,
        ..PipelineConfig::default()
    })
}

/// Writes diagnostic rasters to `<root>/<label>/<stage>.png`.
struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    fn path_for(&self, label: &str, stage: &str) -> PathBuf {
        self.root
            .join(label.replace(['/', '\\', ':'], "_"))
            .join(format!("{stage}.png"))
    }

    fn write(path: &Path, image: &DynamicImage) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        image
            .save_with_format(path, ImageFormat::Png)
            .map_err(|e| e.to_string())
    }
}

impl DiagnosticSink for DirectorySink {
    fn emit(&self, label: &str, stage: &str, image: &DynamicImage) {
        let path = self.path_for(label, stage);
        match Self::write(&path, image) {
            Ok(()) => log::debug!("wrote {}", path.display()),
            Err(e) => log::warn!("could not write {}: {e}", path.display()),
        }
    }
}

/// Collect image files under `paths`, sorted within each directory.
fn collect_inputs(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for path in paths {
        if path.is_dir() {
            walk(path, &mut found);
        } else {
            found.push(path.clone());
        }
    }
    found
}

fn walk(dir: &Path, found: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("cannot read directory {}: {e}", dir.display());
            return;
        }
    };
    let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
    paths.sort();
    for path in paths {
        if path.is_dir() {
            walk(&path, found);
        } else if is_image(&path) {
            found.push(path);
        } else {
            log::debug!("skipping {}", path.display());
        }
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// JSON shape of one input's outcome.
#[derive(Serialize)]
struct ImageOutput<'a> {
    path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tiles: Option<Vec<TileReport>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rejected: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct BatchOutput<'a> {
    images: Vec<ImageOutput<'a>>,
    summary: BatchSummary,
}

fn print_recognition(label: &str, recognition: &Recognition) {
    println!("{label}: {}", recognition.text());
    for tile in &recognition.tiles {
        println!(
            "  #{:<3} {}  {}  at ({}, {})",
            tile.index(),
            tile.dots,
            tile.character.unwrap_or('?'),
            tile.tile.bbox.x,
            tile.tile.bbox.y,
        );
    }
    for rejected in &recognition.rejected {
        println!(
            "  #{:<3} rejected: {}  at ({}, {})",
            rejected.index, rejected.reason, rejected.bbox.x, rejected.bbox.y,
        );
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.verbosity.log_level().as_str()),
    )
    .init();

    let mut recognizer = match Recognizer::new(config) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(ref root) = cli.out {
        recognizer = recognizer.with_sink(Arc::new(DirectorySink { root: root.clone() }));
    }

    let files = collect_inputs(&cli.paths);
    if files.is_empty() {
        eprintln!("No input images found");
        return ExitCode::FAILURE;
    }
    log::info!("{} input images", files.len());

    let mut read_failures = Vec::new();
    let mut inputs = Vec::with_capacity(files.len());
    for path in &files {
        let label = path.display().to_string();
        match std::fs::read(path) {
            Ok(bytes) => inputs.push((label, bytes)),
            Err(e) => {
                log::warn!("{label}: {e}");
                read_failures.push((label, e.to_string()));
            }
        }
    }

    let report = recognizer.process_batch(&inputs);
    let mut summary = report.summary;
    summary.images_failed += read_failures.len();

    // With -v the sink already wrote the annotated image.
    if let Some(ref root) = cli.out
        && recognizer.config().verbosity < Verbosity::Basic
    {
        let sink = DirectorySink { root: root.clone() };
        for (label, outcome) in &report.outcomes {
            if let Ok(recognition) = outcome {
                sink.emit(
                    label,
                    "annotated",
                    &DynamicImage::ImageRgb8(recognition.annotated.clone()),
                );
            }
        }
    }

    if cli.json {
        let mut images: Vec<ImageOutput<'_>> = report
            .outcomes
            .iter()
            .map(|(label, outcome)| match outcome {
                Ok(r) => ImageOutput {
                    path: label,
                    text: Some(r.text()),
                    tiles: Some(r.reports()),
                    rejected: Some(r.rejected.len()),
                    error: None,
                },
                Err(e) => ImageOutput {
                    path: label,
                    text: None,
                    tiles: None,
                    rejected: None,
                    error: Some(e.to_string()),
                },
            })
            .collect();
        images.extend(read_failures.iter().map(|(label, e)| ImageOutput {
            path: label,
            text: None,
            tiles: None,
            rejected: None,
            error: Some(e.clone()),
        }));
        match serde_json::to_string_pretty(&BatchOutput { images, summary }) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing results: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        for (label, outcome) in &report.outcomes {
            match outcome {
                Ok(recognition) => {
                    print_recognition(label, recognition);
                    if recognizer.config().verbosity >= Verbosity::Detailed {
                        eprintln!("{}\n", recognition.diagnostics.report());
                    }
                }
                Err(e) => println!("{label}: error: {e}"),
            }
        }
        for (label, e) in &read_failures {
            println!("{label}: error: {e}");
        }
        println!();
        println!("{summary}");
    }

    ExitCode::SUCCESS
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_match_pipeline_defaults() {
        let cli = Cli::parse_from(["tactile", "photo.jpg"]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn verbose_count_sets_verbosity() {
        let cli = Cli::parse_from(["tactile", "-vv", "photo.jpg"]);
        assert_eq!(config_from_cli(&cli).unwrap().verbosity, Verbosity::Detailed);
    }

    #[test]
    fn tuning_flags_reach_config() {
        let cli = Cli::parse_from([
            "tactile",
            "--aspect-tolerance",
            "0.3",
            "--min-area",
            "500",
            "--canonical-width",
            "80",
            "--downsample-filter",
            "none",
            "a.png",
        ]);
        let config = config_from_cli(&cli).unwrap();
        assert!((config.aspect_tolerance - 0.3).abs() < f64::EPSILON);
        assert!((config.min_area - 500.0).abs() < f64::EPSILON);
        assert_eq!(config.canonical_width, 80);
        assert_eq!(config.downsample_filter, DownsampleFilter::None);
    }

    #[test]
    fn config_json_overrides_flags() {
        let cli = Cli::parse_from([
            "tactile",
            "--min-area",
            "500",
            "--config-json",
            r#"{"dedup_distance": 12.0}"#,
            "a.png",
        ]);
        let config = config_from_cli(&cli).unwrap();
        assert!((config.dedup_distance - 12.0).abs() < f64::EPSILON);
        assert!((config.min_area - PipelineConfig::DEFAULT_MIN_AREA).abs() < f64::EPSILON);
    }

    #[test]
    fn bad_config_json_is_an_error() {
        let cli = Cli::parse_from(["tactile", "--config-json", "{", "a.png"]);
        assert!(config_from_cli(&cli).is_err());
    }

    #[test]
    fn image_extensions() {
        assert!(is_image(Path::new("a/b/photo.JPG")));
        assert!(is_image(Path::new("tile.webp")));
        assert!(!is_image(Path::new("notes.txt")));
        assert!(!is_image(Path::new("README")));
    }

    #[test]
    fn sink_paths_flatten_labels() {
        let sink = DirectorySink {
            root: PathBuf::from("out"),
        };
        assert_eq!(
            sink.path_for("photos/a.jpg", "tile03_closed"),
            PathBuf::from("out/photos_a.jpg/tile03_closed.png")
        );
    }
}
