//! Binary opening and closing with a square structuring element.
//!
//! Thin wrappers over [`imageproc::morphology`] using the L-infinity norm,
//! so a radius of `r` acts like a `(2r+1) x (2r+1)` square kernel.

use image::GrayImage;
use imageproc::distance_transform::Norm;

/// Erosion followed by dilation: removes foreground specks narrower than
/// the kernel. A radius of zero returns the image unchanged.
#[must_use = "returns the opened image"]
pub fn open(binary: &GrayImage, radius: u8) -> GrayImage {
    if radius == 0 {
        return binary.clone();
    }
    imageproc::morphology::open(binary, Norm::LInf, radius)
}

/// Dilation followed by erosion: fills background gaps narrower than the
/// kernel. A radius of zero returns the image unchanged.
#[must_use = "returns the closed image"]
pub fn close(binary: &GrayImage, radius: u8) -> GrayImage {
    if radius == 0 {
        return binary.clone();
    }
    imageproc::morphology::close(binary, Norm::LInf, radius)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn foreground(img: &GrayImage) -> usize {
        img.pixels().filter(|p| p.0[0] > 0).count()
    }

    #[test]
    fn open_removes_isolated_speck() {
        let mut img = GrayImage::new(20, 20);
        img.put_pixel(3, 3, image::Luma([255]));
        for y in 8..16 {
            for x in 8..16 {
                img.put_pixel(x, y, image::Luma([255]));
            }
        }
        let opened = open(&img, 1);
        assert_eq!(opened.get_pixel(3, 3).0[0], 0);
        assert_eq!(foreground(&opened), 64);
    }

    #[test]
    fn close_fills_pinhole() {
        let mut img = GrayImage::from_pixel(12, 12, image::Luma([0]));
        for y in 2..10 {
            for x in 2..10 {
                img.put_pixel(x, y, image::Luma([255]));
            }
        }
        img.put_pixel(5, 5, image::Luma([0]));
        let closed = close(&img, 1);
        assert_eq!(closed.get_pixel(5, 5).0[0], 255);
    }

    #[test]
    fn zero_radius_is_identity() {
        let mut img = GrayImage::new(5, 5);
        img.put_pixel(2, 2, image::Luma([255]));
        assert_eq!(open(&img, 0), img);
        assert_eq!(close(&img, 0), img);
    }
}
