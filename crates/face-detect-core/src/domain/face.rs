//! Detected face types.

use serde::{Deserialize, Serialize};

/// Raw detector output for a single object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// Bounding box `[x1, y1, x2, y2]` in original-image pixels.
    pub bbox: [f32; 4],
    /// Detection confidence (0.0 to 1.0).
    pub confidence: f32,
    /// Index of the predicted class.
    pub class_id: usize,
}

/// A face in the detection response.
///
/// Coordinates are the top-left and bottom-right corners in pixels of the
/// original image. They are not clamped to the image bounds, so boxes near
/// an edge may extend past it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    /// Left edge.
    pub x1: i32,
    /// Top edge.
    pub y1: i32,
    /// Right edge.
    pub x2: i32,
    /// Bottom edge.
    pub y2: i32,
    /// Detection confidence (0.0 to 1.0).
    pub confidence: f32,
}

impl From<&Detection> for FaceBox {
    /// Truncates the float corners toward zero.
    #[allow(clippy::cast_possible_truncation)]
    fn from(det: &Detection) -> Self {
        let [x1, y1, x2, y2] = det.bbox;
        Self {
            x1: x1 as i32,
            y1: y1 as i32,
            x2: x2 as i32,
            y2: y2 as i32,
            confidence: det.confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_box_truncates_toward_zero() {
        let det = Detection {
            bbox: [10.9, 20.2, 110.99, 220.5],
            confidence: 0.87,
            class_id: 0,
        };
        let face = FaceBox::from(&det);
        assert_eq!((face.x1, face.y1, face.x2, face.y2), (10, 20, 110, 220));
        assert!((face.confidence - 0.87).abs() < f32::EPSILON);
    }

    #[test]
    fn test_face_box_keeps_out_of_bounds_coordinates() {
        let det = Detection {
            bbox: [-3.7, -0.4, 1024.6, 800.0],
            confidence: 0.5,
            class_id: 0,
        };
        let face = FaceBox::from(&det);
        assert_eq!(face.x1, -3);
        assert_eq!(face.y1, 0);
        assert_eq!(face.x2, 1024);
    }

    #[test]
    fn test_face_box_serializes_flat() {
        let face = FaceBox {
            x1: 1,
            y1: 2,
            x2: 3,
            y2: 4,
            confidence: 0.5,
        };
        let json = serde_json::to_value(face).unwrap_or_default();
        assert_eq!(json["x1"], 1);
        assert_eq!(json["y2"], 4);
        assert_eq!(json["confidence"], 0.5);
    }
}
