//! Mock implementations of the detector trait.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use face_detect_core::{Detection, DetectionParams, FaceDetector};
use image::DynamicImage;

/// Mock detector returning fixed detections.
///
/// Counts calls and records the size of every image it saw.
pub struct MockDetector {
    detections: Vec<Detection>,
    call_count: Arc<AtomicUsize>,
    seen_sizes: Arc<Mutex<Vec<(u32, u32)>>>,
}

impl MockDetector {
    /// Creates a detector that always returns `detections`.
    #[must_use]
    pub fn new(detections: Vec<Detection>) -> Self {
        Self {
            detections,
            call_count: Arc::new(AtomicUsize::new(0)),
            seen_sizes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Creates a detector that finds nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(vec![])
    }

    /// Creates a detector from `(bbox, confidence)` pairs, all class 0.
    #[must_use]
    pub fn with_boxes(boxes: &[([f32; 4], f32)]) -> Self {
        Self::new(
            boxes
                .iter()
                .map(|&(bbox, confidence)| Detection {
                    bbox,
                    confidence,
                    class_id: 0,
                })
                .collect(),
        )
    }

    /// Returns the number of `detect` calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Returns the `(width, height)` of every image passed to `detect`.
    #[must_use]
    pub fn seen_sizes(&self) -> Vec<(u32, u32)> {
        self.seen_sizes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl FaceDetector for MockDetector {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn detect(
        &self,
        image: &DynamicImage,
        _params: &DetectionParams,
    ) -> anyhow::Result<Vec<Detection>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.seen_sizes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((image.width(), image.height()));
        Ok(self.detections.clone())
    }
}

/// Detector that always returns an error.
pub struct FailingDetector {
    message: String,
}

impl FailingDetector {
    /// Creates a detector failing with `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl FaceDetector for FailingDetector {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn detect(
        &self,
        _image: &DynamicImage,
        _params: &DetectionParams,
    ) -> anyhow::Result<Vec<Detection>> {
        anyhow::bail!("{}", self.message)
    }
}

/// Detector that panics, for exercising worker failure handling.
pub struct PanickingDetector;

impl FaceDetector for PanickingDetector {
    fn name(&self) -> &'static str {
        "panicking"
    }

    #[allow(clippy::panic)]
    fn detect(
        &self,
        _image: &DynamicImage,
        _params: &DetectionParams,
    ) -> anyhow::Result<Vec<Detection>> {
        panic!("detector panicked")
    }
}
