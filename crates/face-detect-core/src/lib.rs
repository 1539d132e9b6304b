//! Face Detect Core - Domain logic and inference
//!
//! This crate contains the domain types, the detector trait, a `YOLOv8`
//! detector on candle, the image codec, face-region blurring and the
//! per-request pipelines.

pub mod blur;
pub mod codec;
pub mod domain;
pub mod error;
pub mod inference;
pub mod pipeline;

pub use domain::{
    DetectResponse, Detection, DetectionParams, FaceBox, FaceDetector, HealthStatus,
    ProcessResponse,
};
pub use error::DetectError;
pub use pipeline::{run_blur, run_detection};
