//! Gaussian blur for noise suppression ahead of tile detection.
//!
//! Wraps [`imageproc::filter::gaussian_blur_f32`]. The blur removes
//! sensor noise and paper texture that would otherwise fragment the
//! adaptive threshold into speckle.

use image::GrayImage;

/// Apply Gaussian blur to a grayscale image.
///
/// Non-positive sigma values return the image unchanged, since
/// `imageproc` panics on `sigma <= 0.0`.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 {
        return image.clone();
    }

    imageproc::filter::gaussian_blur_f32(image, sigma)
}
