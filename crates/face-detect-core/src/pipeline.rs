//! End-to-end handling of one uploaded image.

use image::DynamicImage;
use tracing::{debug, info};

use crate::blur::blur_faces;
use crate::codec::{decode_image, encode_jpeg_base64};
use crate::domain::{DetectResponse, DetectionParams, FaceBox, FaceDetector, ProcessResponse};
use crate::error::DetectError;

/// Decodes `bytes`, runs the detector once and builds the response.
///
/// This is blocking; async callers should run it on a blocking worker.
///
/// # Errors
///
/// Returns [`DetectError::InvalidImage`] for undecodable input,
/// [`DetectError::Inference`] if the detector fails and
/// [`DetectError::Encode`] if the JPEG copy cannot be produced.
pub fn run_detection(
    detector: &dyn FaceDetector,
    params: &DetectionParams,
    jpeg_quality: u8,
    bytes: &[u8],
) -> Result<DetectResponse, DetectError> {
    let image = decode_image(bytes)?;
    let (width, height) = (image.width(), image.height());
    let faces = detect_faces(detector, params, &image)?;

    let encoded = encode_jpeg_base64(&image, jpeg_quality)?;
    Ok(DetectResponse::new(faces, encoded, width, height))
}

/// Decodes `bytes`, detects faces and blurs each face region.
///
/// The returned faces are the same unclamped boxes [`run_detection`]
/// reports; only the blurred regions are clipped to the image. The caller
/// records the elapsed time on the response.
///
/// # Errors
///
/// Same as [`run_detection`].
pub fn run_blur(
    detector: &dyn FaceDetector,
    params: &DetectionParams,
    sigma: f32,
    jpeg_quality: u8,
    bytes: &[u8],
) -> Result<ProcessResponse, DetectError> {
    let image = decode_image(bytes)?;
    let faces = detect_faces(detector, params, &image)?;

    let blurred = DynamicImage::ImageRgba8(blur_faces(&image, &faces, sigma));
    let encoded = encode_jpeg_base64(&blurred, jpeg_quality)?;
    Ok(ProcessResponse::new(faces, encoded))
}

fn detect_faces(
    detector: &dyn FaceDetector,
    params: &DetectionParams,
    image: &DynamicImage,
) -> Result<Vec<FaceBox>, DetectError> {
    info!(
        "Image shape: {}x{} {:?}",
        image.width(),
        image.height(),
        image.color()
    );

    let detections = detector
        .detect(image, params)
        .map_err(DetectError::Inference)?;

    let faces: Vec<FaceBox> = detections
        .iter()
        .map(|det| {
            let face = FaceBox::from(det);
            debug!(
                "Face: ({}, {}) - ({}, {}) conf={:.3}",
                face.x1, face.y1, face.x2, face.y2, face.confidence
            );
            face
        })
        .collect();
    info!("Detected {} faces with {}", faces.len(), detector.name());
    Ok(faces)
}
