//! Normalization of photographs to the working width.
//!
//! Area limits and clustering distances are expressed in pixels, so
//! photographs from different cameras are brought to a common width
//! before detection. Images already at or below the working width are
//! left alone; upscaling would only invent detail.

use std::fmt;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Resampling filter used when downscaling.
///
/// Ordered from fastest/lowest-quality to slowest/highest-quality,
/// with a `None` variant to skip normalization entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DownsampleFilter {
    /// Disabled: keep the source resolution regardless of size.
    None,
    /// Nearest-neighbor: fastest, blocky artifacts.
    Nearest,
    /// Bilinear interpolation: fast, decent quality.
    #[default]
    Triangle,
    /// Bicubic (Catmull-Rom): moderate speed, good quality.
    CatmullRom,
    /// Gaussian: moderate speed, smooth output.
    Gaussian,
    /// Lanczos with 3 lobes: slowest, sharpest.
    Lanczos3,
}

impl DownsampleFilter {
    /// The `image` crate filter, or `None` when normalization is disabled.
    pub(crate) const fn to_image_filter(self) -> Option<image::imageops::FilterType> {
        match self {
            Self::None => Option::None,
            Self::Nearest => Some(image::imageops::FilterType::Nearest),
            Self::Triangle => Some(image::imageops::FilterType::Triangle),
            Self::CatmullRom => Some(image::imageops::FilterType::CatmullRom),
            Self::Gaussian => Some(image::imageops::FilterType::Gaussian),
            Self::Lanczos3 => Some(image::imageops::FilterType::Lanczos3),
        }
    }
}

impl fmt::Display for DownsampleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "None",
            Self::Nearest => "Nearest",
            Self::Triangle => "Triangle",
            Self::CatmullRom => "CatmullRom",
            Self::Gaussian => "Gaussian",
            Self::Lanczos3 => "Lanczos3",
        };
        f.write_str(name)
    }
}

/// Scale `image` down so it is at most `working_width` pixels wide,
/// preserving the aspect ratio.
///
/// Returns the (possibly unchanged) image and whether it was resized.
#[must_use]
pub fn normalize_width(
    image: &DynamicImage,
    working_width: u32,
    filter: DownsampleFilter,
) -> (DynamicImage, bool) {
    let Some(image_filter) = filter.to_image_filter() else {
        return (image.clone(), false);
    };

    let (w, h) = (image.width(), image.height());
    if w <= working_width || working_width == 0 {
        return (image.clone(), false);
    }

    let height = scaled_height(w, h, working_width);
    let resized = image.resize_exact(working_width, height, image_filter);
    (resized, true)
}

/// Height that keeps the aspect ratio when `width` becomes `target_width`.
/// Never zero.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
#[must_use]
pub fn scaled_height(width: u32, height: u32, target_width: u32) -> u32 {
    if width == 0 {
        return height.max(1);
    }
    let scaled = f64::from(height) * f64::from(target_width) / f64::from(width);
    (scaled.round() as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_image(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(image::RgbImage::from_pixel(w, h, image::Rgb([90, 90, 90])))
    }

    #[test]
    fn default_filter_is_triangle() {
        assert_eq!(DownsampleFilter::default(), DownsampleFilter::Triangle);
    }

    #[test]
    fn narrow_image_untouched() {
        let (result, applied) = normalize_width(&test_image(800, 600), 1500, DownsampleFilter::Triangle);
        assert!(!applied);
        assert_eq!(result.width(), 800);
        assert_eq!(result.height(), 600);
    }

    #[test]
    fn wide_image_scaled_to_width() {
        let (result, applied) =
            normalize_width(&test_image(3000, 2000), 1500, DownsampleFilter::Triangle);
        assert!(applied);
        assert_eq!(result.width(), 1500);
        assert_eq!(result.height(), 1000);
    }

    #[test]
    fn portrait_is_scaled_by_width_not_long_axis() {
        let (result, applied) =
            normalize_width(&test_image(2000, 4000), 1000, DownsampleFilter::Nearest);
        assert!(applied);
        assert_eq!(result.width(), 1000);
        assert_eq!(result.height(), 2000);
    }

    #[test]
    fn none_filter_skips_large_image() {
        let (result, applied) = normalize_width(&test_image(3000, 200), 1500, DownsampleFilter::None);
        assert!(!applied);
        assert_eq!(result.width(), 3000);
    }

    #[test]
    fn scaled_height_never_zero() {
        assert_eq!(scaled_height(1000, 1, 10), 1);
        assert_eq!(scaled_height(120, 150, 60), 75);
    }
}
