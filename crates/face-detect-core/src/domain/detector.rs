//! Face detector port.

use image::DynamicImage;

use super::{Detection, DetectionParams};

/// Trait for face detection backends.
///
/// Implementations are loaded once and shared read-only across requests,
/// so `detect` must not require exclusive access.
pub trait FaceDetector: Send + Sync {
    /// Returns the name of this detector.
    fn name(&self) -> &'static str;

    /// Detects faces in an image.
    ///
    /// # Arguments
    ///
    /// * `image` - The decoded image, at its original resolution
    /// * `params` - Inference hyperparameters
    ///
    /// # Returns
    ///
    /// Detections with boxes in original-image pixel coordinates.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    fn detect(&self, image: &DynamicImage, params: &DetectionParams)
        -> anyhow::Result<Vec<Detection>>;
}
