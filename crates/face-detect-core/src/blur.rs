//! Gaussian blurring of detected face regions.

use image::{imageops, DynamicImage, RgbaImage};
use tracing::debug;

use crate::domain::FaceBox;

/// Gaussian sigma applied to each face region.
pub const DEFAULT_BLUR_SIGMA: f32 = 25.0;

/// JPEG quality of the blurred output.
pub const DEFAULT_BLUR_JPEG_QUALITY: u8 = 90;

/// A face box clipped to the image, as `(x, y, width, height)`.
pub type Region = (u32, u32, u32, u32);

/// Clips `face` to a `width` x `height` image.
///
/// Returns `None` when nothing of the box is left inside the image.
#[must_use]
pub fn clamp_to_image(face: &FaceBox, width: u32, height: u32) -> Option<Region> {
    let max_x = i64::from(width);
    let max_y = i64::from(height);
    let x1 = i64::from(face.x1).clamp(0, max_x);
    let y1 = i64::from(face.y1).clamp(0, max_y);
    let x2 = i64::from(face.x2).clamp(0, max_x);
    let y2 = i64::from(face.y2).clamp(0, max_y);

    if x2 <= x1 || y2 <= y1 {
        return None;
    }

    // All four values lie in 0..=u32::MAX after clamping
    let to_u32 = |v: i64| u32::try_from(v).unwrap_or(u32::MAX);
    Some((to_u32(x1), to_u32(y1), to_u32(x2 - x1), to_u32(y2 - y1)))
}

/// Returns an RGBA copy of `image` with every face region blurred.
///
/// Each region is blurred on its own, so colours from outside a box never
/// bleed into it. Boxes that fall entirely outside the image are skipped.
#[must_use]
pub fn blur_faces(image: &DynamicImage, faces: &[FaceBox], sigma: f32) -> RgbaImage {
    let mut canvas = image.to_rgba8();
    let (width, height) = canvas.dimensions();

    for face in faces {
        let Some((x, y, w, h)) = clamp_to_image(face, width, height) else {
            debug!(
                "Skipping face outside image: ({}, {}) - ({}, {})",
                face.x1, face.y1, face.x2, face.y2
            );
            continue;
        };
        let region = imageops::crop_imm(&canvas, x, y, w, h).to_image();
        let blurred = imageops::blur(&region, sigma);
        imageops::replace(&mut canvas, &blurred, i64::from(x), i64::from(y));
    }

    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn face(x1: i32, y1: i32, x2: i32, y2: i32) -> FaceBox {
        FaceBox {
            x1,
            y1,
            x2,
            y2,
            confidence: 0.9,
        }
    }

    fn checkerboard(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        }))
    }

    #[test]
    fn test_clamp_inside_box_is_unchanged() {
        assert_eq!(clamp_to_image(&face(2, 3, 10, 12), 20, 20), Some((2, 3, 8, 9)));
    }

    #[test]
    fn test_clamp_out_of_bounds_box() {
        assert_eq!(
            clamp_to_image(&face(-5, -7, 300, 400), 40, 30),
            Some((0, 0, 40, 30))
        );
        assert_eq!(
            clamp_to_image(&face(35, 20, 60, 50), 40, 30),
            Some((35, 20, 5, 10))
        );
    }

    #[test]
    fn test_clamp_degenerate_boxes() {
        // Inverted
        assert_eq!(clamp_to_image(&face(10, 10, 5, 20), 40, 30), None);
        // Zero width
        assert_eq!(clamp_to_image(&face(10, 10, 10, 20), 40, 30), None);
        // Entirely past the right edge
        assert_eq!(clamp_to_image(&face(50, 0, 60, 10), 40, 30), None);
        // Entirely above the image
        assert_eq!(clamp_to_image(&face(0, -20, 10, -1), 40, 30), None);
    }

    #[test]
    fn test_blur_only_touches_face_region() {
        let image = checkerboard(32, 24);
        let original = image.to_rgba8();
        let blurred = blur_faces(&image, &[face(8, 4, 20, 16)], DEFAULT_BLUR_SIGMA);

        assert_eq!(blurred.dimensions(), (32, 24));
        for (x, y, pixel) in blurred.enumerate_pixels() {
            let inside = (8..20).contains(&x) && (4..16).contains(&y);
            if !inside {
                assert_eq!(pixel, original.get_pixel(x, y), "pixel ({x}, {y}) changed");
            }
        }

        let changed = (8..20)
            .flat_map(|x| (4..16).map(move |y| (x, y)))
            .filter(|&(x, y)| blurred.get_pixel(x, y) != original.get_pixel(x, y))
            .count();
        assert!(changed > 0, "face region was not blurred");
    }

    #[test]
    fn test_blur_skips_degenerate_and_clamps_overflowing_boxes() {
        let image = checkerboard(16, 16);
        let original = image.to_rgba8();

        let untouched = blur_faces(
            &image,
            &[face(10, 10, 4, 4), face(20, 20, 30, 30)],
            DEFAULT_BLUR_SIGMA,
        );
        assert_eq!(untouched, original);

        let clamped = blur_faces(&image, &[face(-10, -10, 8, 8)], DEFAULT_BLUR_SIGMA);
        assert_eq!(clamped.get_pixel(12, 12), original.get_pixel(12, 12));
        assert_ne!(clamped.get_pixel(0, 0), original.get_pixel(0, 0));
    }

    #[test]
    fn test_blur_without_faces_keeps_pixels() {
        let image = checkerboard(8, 8);
        assert_eq!(blur_faces(&image, &[], DEFAULT_BLUR_SIGMA), image.to_rgba8());
    }
}
