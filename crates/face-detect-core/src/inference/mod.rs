//! ML inference engine using Candle.
//!
//! Provides the `YOLOv8` face detector, weight loading and offline
//! inspection of weight files.

mod detector;
mod device;
mod inspect;
mod loader;
mod utils;
mod yolo;

pub use detector::{YoloConfig, YoloFaceDetector};
pub use device::DevicePreference;
pub use inspect::{ModelReport, TensorSummary};
pub use loader::{load_safetensors, read_weights_file};
pub use utils::{iou, non_max_suppression};
pub use yolo::{Multiples, Variant, YoloV8};
