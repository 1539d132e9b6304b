//! Inference hyperparameters.

/// Hyperparameters passed to the detector on every call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionParams {
    /// Minimum class score for a candidate box to be kept.
    pub confidence_threshold: f32,
    /// IoU above which the weaker of two overlapping boxes is suppressed.
    pub iou_threshold: f32,
    /// Maximum number of detections returned per image.
    pub max_detections: usize,
    /// Target length of the long edge of the network input, in pixels.
    pub image_size: usize,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.15,
            iou_threshold: 0.45,
            max_detections: 50,
            image_size: 640,
        }
    }
}

impl DetectionParams {
    /// Checks that every field is within its accepted range.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(format!(
                "confidence_threshold must be 0.0-1.0, got {}",
                self.confidence_threshold
            ));
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(format!(
                "iou_threshold must be 0.0-1.0, got {}",
                self.iou_threshold
            ));
        }
        if self.max_detections == 0 {
            return Err("max_detections must be at least 1".to_string());
        }
        if self.image_size == 0 || self.image_size % 32 != 0 {
            return Err(format!(
                "image_size must be a positive multiple of 32, got {}",
                self.image_size
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_service_contract() {
        let params = DetectionParams::default();
        assert!((params.confidence_threshold - 0.15).abs() < f32::EPSILON);
        assert!((params.iou_threshold - 0.45).abs() < f32::EPSILON);
        assert_eq!(params.max_detections, 50);
        assert_eq!(params.image_size, 640);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range_thresholds() {
        let params = DetectionParams {
            confidence_threshold: 1.5,
            ..DetectionParams::default()
        };
        assert!(params
            .validate()
            .is_err_and(|e| e.contains("confidence_threshold")));

        let params = DetectionParams {
            iou_threshold: -0.1,
            ..DetectionParams::default()
        };
        assert!(params.validate().is_err_and(|e| e.contains("iou_threshold")));
    }

    #[test]
    fn test_validate_rejects_bad_sizes() {
        let params = DetectionParams {
            max_detections: 0,
            ..DetectionParams::default()
        };
        assert!(params.validate().is_err());

        let params = DetectionParams {
            image_size: 650,
            ..DetectionParams::default()
        };
        assert!(params.validate().is_err_and(|e| e.contains("image_size")));
    }
}
