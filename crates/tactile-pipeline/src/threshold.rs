//! Adaptive (local) thresholding.
//!
//! Each pixel is compared against a statistic of its own neighbourhood
//! rather than a global level, so uneven lighting across a photograph
//! does not swallow tiles in shadow. Two statistics are supported: a box
//! mean computed from an integral image, and a Gaussian-weighted mean
//! whose sigma is derived from the block size.

use image::GrayImage;
use serde::{Deserialize, Serialize};

/// Local statistic a pixel is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AdaptiveMethod {
    /// Unweighted mean of the block.
    Mean,
    /// Gaussian-weighted mean of the block.
    #[default]
    Gaussian,
}

/// Which side of the local threshold becomes foreground (255).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Pixels brighter than `local - offset` are foreground.
    Bright,
    /// Pixels at or below `local - offset` are foreground.
    Dark,
}

/// Binarize `image` against its local neighbourhood statistic.
///
/// `block_size` is the side of the square neighbourhood. The window
/// reaches `block_size / 2` pixels either side, so an even size behaves
/// as the next odd size up. Pixels outside the image are
/// replicated from the nearest edge (Gaussian) or excluded from the
/// window (mean).
#[must_use = "returns the binary image"]
pub fn adaptive_threshold(
    image: &GrayImage,
    method: AdaptiveMethod,
    block_size: u32,
    offset: f32,
    polarity: Polarity,
) -> GrayImage {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return image.clone();
    }

    let radius = (block_size / 2) as usize;
    let local = match method {
        AdaptiveMethod::Mean => local_mean(image, radius),
        AdaptiveMethod::Gaussian => local_gaussian(image, radius),
    };

    let width = w as usize;
    GrayImage::from_fn(w, h, |x, y| {
        let value = f32::from(image.get_pixel(x, y).0[0]);
        let threshold = local[y as usize * width + x as usize] - offset;
        let foreground = match polarity {
            Polarity::Bright => value > threshold,
            Polarity::Dark => value <= threshold,
        };
        image::Luma([if foreground { 255 } else { 0 }])
    })
}

/// Sigma of the Gaussian window for a block of side `2 * radius + 1`.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn block_sigma(radius: usize) -> f32 {
    let block = (2 * radius + 1) as f32;
    0.3f32.mul_add((block - 1.0).mul_add(0.5, -1.0), 0.8)
}

/// Box mean over a clamped `(2r+1)^2` window via an integral image.
#[allow(clippy::cast_precision_loss)]
fn local_mean(image: &GrayImage, radius: usize) -> Vec<f32> {
    let (w, h) = (image.width() as usize, image.height() as usize);
    let iw = w + 1;
    let mut integral = vec![0u64; iw * (h + 1)];

    for y in 0..h {
        let mut row_sum = 0u64;
        for x in 0..w {
            row_sum += u64::from(image.as_raw()[y * w + x]);
            integral[(y + 1) * iw + (x + 1)] = row_sum + integral[y * iw + (x + 1)];
        }
    }

    let mut out = vec![0.0f32; w * h];
    for y in 0..h {
        let y0 = y.saturating_sub(radius);
        let y1 = (y + radius).min(h - 1) + 1;
        for x in 0..w {
            let x0 = x.saturating_sub(radius);
            let x1 = (x + radius).min(w - 1) + 1;
            let sum = integral[y1 * iw + x1] + integral[y0 * iw + x0]
                - integral[y0 * iw + x1]
                - integral[y1 * iw + x0];
            let count = ((y1 - y0) * (x1 - x0)) as f64;
            out[y * w + x] = (sum as f64 / count) as f32;
        }
    }
    out
}

/// Separable Gaussian-weighted mean with edge replication.
fn local_gaussian(image: &GrayImage, radius: usize) -> Vec<f32> {
    let (w, h) = (image.width() as usize, image.height() as usize);
    let kernel = gaussian_kernel(radius);

    let src: Vec<f32> = image.as_raw().iter().map(|&v| f32::from(v)).collect();
    let mut horizontal = vec![0.0f32; w * h];
    for y in 0..h {
        let row = &src[y * w..(y + 1) * w];
        for x in 0..w {
            horizontal[y * w + x] = kernel
                .iter()
                .enumerate()
                .map(|(k, weight)| weight * row[clamp_offset(x, k, radius, w)])
                .sum();
        }
    }

    let mut out = vec![0.0f32; w * h];
    for y in 0..h {
        for x in 0..w {
            out[y * w + x] = kernel
                .iter()
                .enumerate()
                .map(|(k, weight)| weight * horizontal[clamp_offset(y, k, radius, h) * w + x])
                .sum();
        }
    }
    out
}

/// Index `center + k - radius`, clamped to `[0, len)`.
const fn clamp_offset(center: usize, k: usize, radius: usize, len: usize) -> usize {
    let i = center + k;
    if i < radius {
        0
    } else if i - radius >= len {
        len - 1
    } else {
        i - radius
    }
}

/// Normalized 1-D Gaussian weights of length `2 * radius + 1`.
#[allow(clippy::cast_precision_loss)]
fn gaussian_kernel(radius: usize) -> Vec<f32> {
    let sigma = block_sigma(radius);
    let denom = 2.0 * sigma * sigma;
    let weights: Vec<f32> = (0..=2 * radius)
        .map(|i| {
            let d = i as f32 - radius as f32;
            (-(d * d) / denom).exp()
        })
        .collect();
    let total: f32 = weights.iter().sum();
    weights.into_iter().map(|v| v / total).collect()
}
