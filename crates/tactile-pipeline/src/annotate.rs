//! Debug overlays.
//!
//! None of these affect recognition; they only render what the pipeline
//! saw so a human can check it.

use image::{GrayImage, Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_hollow_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut,
};
use imageproc::rect::Rect;

use crate::classify::Cell;
use crate::detect::Candidate;
use crate::dots::{BrailleDots, Dot};
use crate::geometry::{BoundingBox, Polygon};
use crate::pipeline::RecognizedTile;

/// Outline colour of a tile read as a known character.
pub const KNOWN: Rgb<u8> = Rgb([0, 200, 0]);

/// Outline colour of a tile whose pattern is not in the alphabet.
pub const UNKNOWN: Rgb<u8> = Rgb([255, 140, 0]);

/// Outline colour of a candidate the rectifier rejected.
pub const REJECTED: Rgb<u8> = Rgb([220, 0, 0]);

const GLYPH_INK: Rgb<u8> = Rgb([0, 90, 255]);

/// Draw recognized tiles and rejected candidates on a copy of `base`.
///
/// Every tile gets its outline and a small 2x3 glyph of the dots that were
/// read, placed above the tile or, when that would leave the image, just
/// inside its top edge.
#[must_use]
pub fn annotate(base: &RgbImage, tiles: &[RecognizedTile], rejected: &[&Polygon]) -> RgbImage {
    let mut canvas = base.clone();
    for polygon in rejected {
        draw_polygon_outline(&mut canvas, polygon, REJECTED);
    }
    for tile in tiles {
        let color = if tile.character.is_some() {
            KNOWN
        } else {
            UNKNOWN
        };
        draw_polygon_outline(&mut canvas, &tile.tile.polygon, color);
        draw_dot_glyph(&mut canvas, tile.tile.bbox, tile.dots);
    }
    canvas
}

/// Candidate outlines over the binary detection mask.
#[must_use]
pub fn candidate_overlay(mask: &GrayImage, candidates: &[Candidate]) -> RgbImage {
    let mut canvas = gray_to_rgb(mask);
    for candidate in candidates {
        draw_polygon_outline(&mut canvas, &candidate.polygon, KNOWN);
    }
    canvas
}

/// Grid cells and accepted blob boxes over a canonical tile.
#[must_use]
pub fn blob_overlay(tile: &GrayImage, blobs: &[BoundingBox], cells: &[Cell; 6]) -> RgbImage {
    let mut canvas = gray_to_rgb(tile);
    for cell in cells {
        #[allow(clippy::cast_possible_truncation)]
        let (x, y) = (cell.min.x.round() as i32, cell.min.y.round() as i32);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let side = ((cell.max.x - cell.min.x).round() as u32).max(1);
        draw_hollow_rect_mut(&mut canvas, Rect::at(x, y).of_size(side, side), GLYPH_INK);
    }
    for blob in blobs {
        let rect = Rect::at(blob.x, blob.y).of_size(blob.width.max(1), blob.height.max(1));
        draw_hollow_rect_mut(&mut canvas, rect, REJECTED);
    }
    canvas
}

fn gray_to_rgb(image: &GrayImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let v = image.get_pixel(x, y).0[0];
        Rgb([v, v, v])
    })
}

/// Closed outline, two pixels thick.
#[allow(clippy::cast_precision_loss)]
fn draw_polygon_outline(canvas: &mut RgbImage, polygon: &Polygon, color: Rgb<u8>) {
    let points = polygon.points();
    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        for offset in [0.0, 1.0] {
            draw_line_segment_mut(
                canvas,
                (a.x as f32 + offset, a.y as f32 + offset),
                (b.x as f32 + offset, b.y as f32 + offset),
                color,
            );
        }
    }
}

/// Where the dot glyph for a tile goes, and the spacing between its dots.
#[allow(clippy::cast_possible_wrap)]
fn glyph_placement(image: BoundingBox, tile: BoundingBox) -> (BoundingBox, i32) {
    let pitch = (tile.width / 6).max(6);
    let (w, h) = (2 * pitch, 3 * pitch);
    let x = tile.x + (tile.width / 2) as i32 - pitch as i32;
    let margin = (pitch / 2) as i32;

    let above = BoundingBox::new(x, tile.y - h as i32 - margin, w, h);
    let placed = if image.contains(&above) {
        above
    } else {
        BoundingBox::new(x, tile.y + margin, w, h)
    };
    (placed, pitch as i32)
}

#[allow(clippy::cast_possible_wrap)]
fn draw_dot_glyph(canvas: &mut RgbImage, tile: BoundingBox, dots: BrailleDots) {
    let image = BoundingBox::new(0, 0, canvas.width(), canvas.height());
    let (glyph, pitch) = glyph_placement(image, tile);
    let radius = (pitch / 3).max(1);
    for dot in Dot::ALL {
        let i = dot.index() as i32;
        let center = (
            glyph.x + pitch / 2 + (i / 3) * pitch,
            glyph.y + pitch / 2 + (i % 3) * pitch,
        );
        if dots.contains(dot) {
            draw_filled_circle_mut(canvas, center, radius, GLYPH_INK);
        } else {
            draw_hollow_circle_mut(canvas, center, radius, GLYPH_INK);
        }
    }
}
