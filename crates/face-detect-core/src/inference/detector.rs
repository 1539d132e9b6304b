//! `YOLOv8` face detector.

// Allow common ML/image code patterns
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use candle_core::{DType, Device, IndexOp, Module, Tensor};
use image::DynamicImage;
use tracing::{debug, info};

use super::utils::non_max_suppression;
use super::yolo::{Variant, YoloV8};
use super::{load_safetensors, DevicePreference};
use crate::domain::{Detection, DetectionParams, FaceDetector};

/// Stride of the coarsest feature map; input sides must be multiples of it.
const MAX_STRIDE: usize = 32;

/// Configuration for loading the detector.
#[derive(Debug, Clone)]
pub struct YoloConfig {
    /// Path to the safetensors weights.
    pub model_path: PathBuf,
    /// Network size variant.
    pub variant: Variant,
    /// Number of classes the head was trained on.
    pub num_classes: usize,
    /// Device to run on.
    pub device: DevicePreference,
}

impl YoloConfig {
    /// Creates a config for a single-class nano model at `path`.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            model_path: path.as_ref().to_path_buf(),
            variant: Variant::default(),
            num_classes: 1,
            device: DevicePreference::default(),
        }
    }

    /// Sets the network variant.
    #[must_use]
    pub const fn with_variant(mut self, variant: Variant) -> Self {
        self.variant = variant;
        self
    }

    /// Sets the number of classes.
    #[must_use]
    pub const fn with_num_classes(mut self, num_classes: usize) -> Self {
        self.num_classes = num_classes;
        self
    }

    /// Sets the device preference.
    #[must_use]
    pub const fn with_device(mut self, device: DevicePreference) -> Self {
        self.device = device;
        self
    }
}

/// Face detector backed by a `YOLOv8` network.
///
/// The weights are loaded eagerly in [`YoloFaceDetector::load`]; after that
/// the detector is immutable and can be shared between threads.
pub struct YoloFaceDetector {
    model: YoloV8,
    device: Device,
}

impl YoloFaceDetector {
    /// Loads the network described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the weights cannot be read or do not match the
    /// configured variant and class count.
    pub fn load(config: &YoloConfig) -> Result<Self> {
        let device = config.device.resolve();
        info!(
            "Loading YOLOv8{} ({} classes) from {}",
            config.variant,
            config.num_classes,
            config.model_path.display()
        );
        let vb = load_safetensors(&config.model_path, &device)
            .context("Failed to load detector weights")?;
        let model = YoloV8::new(vb, config.variant, config.num_classes).with_context(|| {
            format!(
                "Weights do not match YOLOv8{} with {} classes",
                config.variant, config.num_classes
            )
        })?;
        Ok(Self::from_model(model, device))
    }

    /// Wraps an already built network.
    #[must_use]
    pub const fn from_model(model: YoloV8, device: Device) -> Self {
        Self { model, device }
    }

    /// Resizes and normalises an image into a `(1, 3, H, W)` tensor.
    ///
    /// The long edge becomes `image_size`; both sides are rounded down to a
    /// multiple of 32 (never below 32). Returns the tensor and the network
    /// input width and height.
    fn preprocess(
        &self,
        image: &DynamicImage,
        image_size: usize,
    ) -> Result<(Tensor, usize, usize)> {
        let (width, height) = input_dims(
            image.width() as usize,
            image.height() as usize,
            image_size,
        );

        let resized = image.resize_exact(
            width as u32,
            height as u32,
            image::imageops::FilterType::CatmullRom,
        );
        let data = resized.to_rgb8().into_raw();

        let tensor = Tensor::from_vec(data, (height, width, 3), &self.device)?
            .permute((2, 0, 1))?
            .unsqueeze(0)?
            .to_dtype(DType::F32)?;
        let tensor = (tensor * (1.0 / 255.0)).context("Failed to normalise input")?;

        Ok((tensor, width, height))
    }
}

impl FaceDetector for YoloFaceDetector {
    fn name(&self) -> &'static str {
        "yolov8"
    }

    fn detect(&self, image: &DynamicImage, params: &DetectionParams) -> Result<Vec<Detection>> {
        let (input, input_w, input_h) = self.preprocess(image, params.image_size)?;
        debug!("Network input {input_w}x{input_h}");

        let output = self
            .model
            .forward(&input)
            .context("Forward pass failed")?
            .i(0)?
            .to_dtype(DType::F32)?;

        let scale_x = image.width() as f32 / input_w as f32;
        let scale_y = image.height() as f32 / input_h as f32;

        decode_predictions(&output, params, scale_x, scale_y)
    }
}

/// Network input size for an image, keeping aspect ratio.
fn input_dims(width: usize, height: usize, image_size: usize) -> (usize, usize) {
    let round = |v: usize| (v / MAX_STRIDE * MAX_STRIDE).max(MAX_STRIDE);
    let (width, height) = (width.max(1), height.max(1));
    if width < height {
        (round(width * image_size / height), round(image_size))
    } else {
        (round(image_size), round(height * image_size / width))
    }
}

/// Decodes the `(4 + num_classes, A)` prediction matrix into detections.
///
/// Boxes are scaled from network input pixels to original pixels with the
/// per-axis ratios. They are not clamped to the image.
fn decode_predictions(
    output: &Tensor,
    params: &DetectionParams,
    scale_x: f32,
    scale_y: f32,
) -> Result<Vec<Detection>> {
    // (A, 4 + num_classes)
    let rows = output.t()?.to_vec2::<f32>()?;

    let mut candidates = Vec::new();
    for row in &rows {
        let Some((class_id, &confidence)) = row[4..]
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        else {
            continue;
        };

        if confidence <= params.confidence_threshold {
            continue;
        }

        let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
        candidates.push(Detection {
            bbox: [
                (cx - w / 2.0) * scale_x,
                (cy - h / 2.0) * scale_y,
                (cx + w / 2.0) * scale_x,
                (cy + h / 2.0) * scale_y,
            ],
            confidence,
            class_id,
        });
    }

    debug!("{} candidates above threshold", candidates.len());

    let mut detections = non_max_suppression(candidates, params.iou_threshold);
    detections.truncate(params.max_detections);
    Ok(detections)
}
