//! Dot-grid classification of a rectified tile.
//!
//! The tile is resized to a canonical width, dark blobs are isolated with
//! an inverted adaptive threshold and a closing, and each blob of a
//! plausible dot size is assigned to whichever of the six grid cells
//! contains its centre. Blobs outside every cell (the cut corner, edge
//! shadows) are ignored.

use image::GrayImage;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use crate::contour::ContourTracer;
use crate::dots::{BrailleDots, Dot};
use crate::downsample::scaled_height;
use crate::geometry::{BoundingBox, PointF};
use crate::morphology;
use crate::threshold::{Polarity, adaptive_threshold};
use crate::types::PipelineConfig;

/// Where the six dot cells sit on a tile, as fractions of its size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridLayout {
    /// Horizontal centres of the left and right columns (fraction of width).
    pub columns: [f64; 2],
    /// Vertical centres of the top, middle and bottom rows (fraction of
    /// height).
    pub rows: [f64; 3],
    /// Side of each square cell as a fraction of tile width.
    pub cell_size: f64,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            columns: [1.0 / 3.0, 2.0 / 3.0],
            rows: [0.25, 0.5, 0.75],
            cell_size: 0.2,
        }
    }
}

impl GridLayout {
    /// Check that every fraction lies inside the tile.
    ///
    /// # Errors
    ///
    /// Returns a message naming the offending field.
    pub fn validate(&self) -> Result<(), String> {
        let inside = |v: f64| v > 0.0 && v < 1.0;
        if !self.columns.iter().copied().all(inside) {
            return Err(format!("grid columns must lie in (0, 1): {:?}", self.columns));
        }
        if !self.rows.iter().copied().all(inside) {
            return Err(format!("grid rows must lie in (0, 1): {:?}", self.rows));
        }
        if !(self.cell_size > 0.0 && self.cell_size <= 1.0) {
            return Err(format!("grid cell_size must lie in (0, 1]: {}", self.cell_size));
        }
        Ok(())
    }

    /// The six cells for a tile of the given size, in dot order.
    #[must_use]
    pub fn cells(&self, width: u32, height: u32) -> [Cell; 6] {
        let (w, h) = (f64::from(width), f64::from(height));
        let half = self.cell_size * w / 2.0;
        Dot::ALL.map(|dot| {
            let i = dot.index();
            let cx = self.columns[i / 3] * w;
            let cy = self.rows[i % 3] * h;
            Cell {
                dot,
                min: PointF::new(cx - half, cy - half),
                max: PointF::new(cx + half, cy + half),
            }
        })
    }
}

/// A square region that raises one dot when a blob centre falls inside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    /// The dot this cell stands for.
    pub dot: Dot,
    /// Top-left corner.
    pub min: PointF,
    /// Bottom-right corner.
    pub max: PointF,
}

impl Cell {
    /// Whether `p` is inside the cell, edges included.
    #[must_use]
    pub fn contains(&self, p: PointF) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

/// Output of classifying one tile.
#[derive(Debug, Clone)]
pub struct Classification {
    /// Raised dots found.
    pub dots: BrailleDots,
    /// The tile at canonical width.
    pub canonical: GrayImage,
    /// Dark-blob mask after closing.
    pub closed: GrayImage,
    /// Bounding boxes of blobs that passed the size filter.
    pub blobs: Vec<BoundingBox>,
}

/// Find the raised dots on a rectified tile.
#[must_use]
pub fn classify(tile: &GrayImage, config: &PipelineConfig) -> Classification {
    let width = config.canonical_width;
    let height = scaled_height(tile.width(), tile.height(), width);
    let canonical = image::imageops::resize(tile, width, height, FilterType::Triangle);

    let binary = adaptive_threshold(
        &canonical,
        config.classify_method,
        config.classify_block_size,
        config.classify_offset,
        Polarity::Dark,
    );
    let closed = morphology::close(&binary, config.closing_radius);

    let size_range = config.dot_min_size..=config.dot_max_size;
    let blobs: Vec<BoundingBox> = config
        .contour_tracer
        .trace(&closed)
        .iter()
        .filter_map(|ring| BoundingBox::from_points(ring))
        .filter(|bb| size_range.contains(&bb.width) && size_range.contains(&bb.height))
        .collect();

    let cells = config.grid.cells(width, height);
    let dots = dots_from_blobs(&blobs, &cells);
    log::debug!("tile classified as {dots} from {} blobs", blobs.len());

    Classification {
        dots,
        canonical,
        closed,
        blobs,
    }
}

/// Raise the dot of every cell that contains a blob centre.
///
/// The result depends only on the set of blobs, not their order.
#[must_use]
pub fn dots_from_blobs(blobs: &[BoundingBox], cells: &[Cell; 6]) -> BrailleDots {
    let mut dots = BrailleDots::EMPTY;
    for blob in blobs {
        let center = blob.center();
        for cell in cells.iter().filter(|c| c.contains(center)) {
            dots.set(cell.dot);
        }
    }
    dots
}
