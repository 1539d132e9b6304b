//! Test support utilities for face-detect.
//!
//! Provides mock detectors, encoded synthetic images, multipart request
//! bodies and weight-file fixtures for testing the service.
//!
//! # Example
//!
//! ```
//! use face_detect_test_support::{MockDetector, MultipartBody, SyntheticImageBuilder};
//!
//! let png = SyntheticImageBuilder::png(64, 48);
//! let (content_type, body) = MultipartBody::new().file("image", "face.png", &png).build();
//! assert!(content_type.starts_with("multipart/form-data"));
//! assert!(!body.is_empty());
//!
//! let detector = MockDetector::with_boxes(&[([10.0, 10.0, 30.0, 40.0], 0.9)]);
//! assert_eq!(detector.call_count(), 0);
//! ```

mod builders;
mod mocks;
mod multipart;
mod weights;

pub use builders::SyntheticImageBuilder;
pub use mocks::{FailingDetector, MockDetector, PanickingDetector};
pub use multipart::MultipartBody;
pub use weights::write_weights_fixture;
