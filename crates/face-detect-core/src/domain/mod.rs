//! Core domain types for face detection.

mod detector;
mod face;
mod params;
mod response;

pub use detector::FaceDetector;
pub use face::{Detection, FaceBox};
pub use params::DetectionParams;
pub use response::{DetectResponse, HealthStatus, ProcessResponse};
