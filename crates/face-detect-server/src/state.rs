//! Application state shared by all handlers

use std::sync::Arc;

use face_detect_core::blur::{DEFAULT_BLUR_JPEG_QUALITY, DEFAULT_BLUR_SIGMA};
use face_detect_core::codec::DEFAULT_JPEG_QUALITY;
use face_detect_core::{DetectionParams, FaceDetector};

/// Default cap on upload size.
pub const DEFAULT_BODY_LIMIT: usize = 32 * 1024 * 1024;

/// Shared application state.
///
/// The detector is built once before the listener binds and never replaced.
#[derive(Clone)]
pub struct AppState {
    /// Detector reference - Arc for cheap clones
    pub detector: Arc<dyn FaceDetector>,
    /// Inference parameters applied to every request.
    pub params: DetectionParams,
    /// JPEG quality of the echoed image.
    pub jpeg_quality: u8,
    /// Gaussian sigma used by `/process`.
    pub blur_sigma: f32,
    /// JPEG quality of the blurred image.
    pub blur_jpeg_quality: u8,
    /// Maximum accepted request body size in bytes.
    pub body_limit: usize,
}

impl AppState {
    pub fn new(detector: Arc<dyn FaceDetector>) -> Self {
        Self {
            detector,
            params: DetectionParams::default(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            blur_sigma: DEFAULT_BLUR_SIGMA,
            blur_jpeg_quality: DEFAULT_BLUR_JPEG_QUALITY,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    #[must_use]
    pub const fn with_params(mut self, params: DetectionParams) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub const fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    #[must_use]
    pub const fn with_blur(mut self, sigma: f32, quality: u8) -> Self {
        self.blur_sigma = sigma;
        self.blur_jpeg_quality = quality;
        self
    }

    #[must_use]
    pub const fn with_body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }
}
