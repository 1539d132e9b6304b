//! Image decoding and JPEG/base64 re-encoding.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;

use crate::error::DetectError;

/// Default JPEG quality for the echoed image.
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Decodes uploaded bytes, sniffing the format from the content.
///
/// # Errors
///
/// Returns [`DetectError::InvalidImage`] if the bytes are empty or not a
/// supported image.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, DetectError> {
    image::load_from_memory(bytes).map_err(DetectError::InvalidImage)
}

/// Encodes an image as JPEG and returns it as standard padded base64.
///
/// Alpha is dropped; 16-bit and float images are reduced to 8-bit RGB.
///
/// # Errors
///
/// Returns [`DetectError::Encode`] if the JPEG encoder fails.
pub fn encode_jpeg_base64(image: &DynamicImage, quality: u8) -> Result<String, DetectError> {
    let rgb = image.to_rgb8();
    let mut buf = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(DetectError::Encode)?;
    Ok(STANDARD.encode(buf.into_inner()))
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};

    fn png_bytes(image: &DynamicImage) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        image.write_to(&mut buf, ImageFormat::Png).expect("png");
        buf.into_inner()
    }

    #[test]
    fn test_decode_png() {
        let bytes = png_bytes(&DynamicImage::new_rgb8(7, 5));
        let image = decode_image(&bytes).expect("decode");
        assert_eq!((image.width(), image.height()), (7, 5));
    }

    #[test]
    fn test_decode_rejects_garbage_and_empty() {
        assert!(matches!(
            decode_image(b"definitely not an image"),
            Err(DetectError::InvalidImage(_))
        ));
        assert!(matches!(decode_image(&[]), Err(DetectError::InvalidImage(_))));
    }

    #[test]
    fn test_encode_drops_alpha_and_keeps_size() {
        let rgba = RgbaImage::from_pixel(12, 9, Rgba([10, 200, 30, 0]));
        let encoded = encode_jpeg_base64(&DynamicImage::ImageRgba8(rgba), 95).expect("encode");

        let jpeg = STANDARD.decode(encoded).expect("base64");
        assert_eq!(image::guess_format(&jpeg).expect("format"), ImageFormat::Jpeg);
        let back = image::load_from_memory(&jpeg).expect("jpeg");
        assert_eq!((back.width(), back.height()), (12, 9));
        assert!(!back.color().has_alpha());
    }
}
