//! Response payloads.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::FaceBox;

/// Successful detection response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectResponse {
    /// Detected faces. Order carries no meaning.
    pub faces: Vec<FaceBox>,
    /// Re-encoded input image, JPEG as standard base64.
    pub image: String,
    /// Original image width in pixels.
    pub width: u32,
    /// Original image height in pixels.
    pub height: u32,
    /// Number of entries in `faces`.
    pub num_faces: usize,
}

impl DetectResponse {
    /// Builds a response, deriving `num_faces` from `faces`.
    #[must_use]
    pub fn new(faces: Vec<FaceBox>, image: String, width: u32, height: u32) -> Self {
        let num_faces = faces.len();
        Self {
            faces,
            image,
            width,
            height,
            num_faces,
        }
    }
}

/// Successful blur response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessResponse {
    /// Input image with every face region blurred, JPEG as standard base64.
    pub image: String,
    /// Number of entries in `faces`.
    pub num_faces: usize,
    /// Detected faces, unclamped, as `/detect` reports them.
    pub faces: Vec<FaceBox>,
    /// Wall time spent on the request, in milliseconds.
    pub processing_time_ms: u64,
}

impl ProcessResponse {
    /// Builds a response with no timing recorded yet.
    #[must_use]
    pub fn new(faces: Vec<FaceBox>, image: String) -> Self {
        Self {
            image,
            num_faces: faces.len(),
            faces,
            processing_time_ms: 0,
        }
    }

    #[must_use]
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.processing_time_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self
    }
}

/// Health check payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
}

impl HealthStatus {
    /// The fixed healthy status reported by the service.
    #[must_use]
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            service: "face-detection".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_num_faces_matches_faces() {
        let face = FaceBox {
            x1: 0,
            y1: 0,
            x2: 10,
            y2: 10,
            confidence: 0.9,
        };
        let response = DetectResponse::new(vec![face, face], String::new(), 20, 20);
        assert_eq!(response.num_faces, 2);

        let empty = DetectResponse::new(vec![], String::new(), 20, 20);
        assert_eq!(empty.num_faces, 0);
    }

    #[test]
    fn test_process_response_fields() {
        let face = FaceBox {
            x1: 1,
            y1: 2,
            x2: 3,
            y2: 4,
            confidence: 0.5,
        };
        let response = ProcessResponse::new(vec![face], "abc".to_string())
            .with_elapsed(Duration::from_micros(12_700));
        assert_eq!(response.num_faces, 1);
        assert_eq!(response.processing_time_ms, 12);

        let value = serde_json::to_value(&response).unwrap_or_default();
        let mut keys: Vec<&str> = value
            .as_object()
            .map(|o| o.keys().map(String::as_str).collect())
            .unwrap_or_default();
        keys.sort_unstable();
        assert_eq!(keys, ["faces", "image", "num_faces", "processing_time_ms"]);
    }

    #[test]
    fn test_health_payload() {
        let json = serde_json::to_string(&HealthStatus::healthy()).unwrap_or_default();
        assert_eq!(json, r#"{"status":"healthy","service":"face-detection"}"#);
    }
}
