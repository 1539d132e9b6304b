//! Synthetic image builders for testing.

use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage, Rgba, RgbaImage};

/// Builder for creating synthetic test images.
///
/// Images come back already encoded, ready to upload.
pub struct SyntheticImageBuilder;

impl SyntheticImageBuilder {
    /// Encodes an image in the given format.
    ///
    /// # Panics
    ///
    /// Panics if the encoder rejects the image.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        image
            .write_to(&mut buf, format)
            .expect("encode synthetic image");
        buf.into_inner()
    }

    /// A mid-gray RGB PNG.
    #[must_use]
    pub fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([128, 128, 128]));
        Self::encode(&DynamicImage::ImageRgb8(img), ImageFormat::Png)
    }

    /// A horizontal RGB gradient as JPEG.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, _| {
            let val = ((u32::from(u8::MAX) * x) / width.max(1)) as u8;
            Rgb([val, 255 - val, 64])
        });
        Self::encode(&DynamicImage::ImageRgb8(img), ImageFormat::Jpeg)
    }

    /// A half-transparent RGBA PNG.
    #[must_use]
    pub fn rgba_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, 128]));
        Self::encode(&DynamicImage::ImageRgba8(img), ImageFormat::Png)
    }

    /// A grayscale checkerboard PNG with 8 pixel cells.
    #[must_use]
    pub fn checkerboard_png(width: u32, height: u32) -> Vec<u8> {
        let img = GrayImage::from_fn(width, height, |x, y| {
            if (x / 8 + y / 8) % 2 == 0 {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        });
        Self::encode(&DynamicImage::ImageLuma8(img), ImageFormat::Png)
    }

    /// Bytes that no decoder accepts.
    #[must_use]
    pub fn garbage() -> Vec<u8> {
        b"this is not an image, just some text".to_vec()
    }
}
