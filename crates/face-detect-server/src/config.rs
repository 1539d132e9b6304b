//! Configuration file support for face-detect.
//!
//! Supports TOML configuration from:
//! - XDG config: `~/.config/face-detect/config.toml` (lowest priority)
//! - Project-local: `.face-detect.toml` (searched up directory tree)
//! - CLI flags (highest priority, applied separately)

use std::path::{Path, PathBuf};

use face_detect_core::inference::{DevicePreference, Variant};
use face_detect_core::DetectionParams;
use serde::Deserialize;
use tracing::{debug, info, warn};

/// File name of the project-local config.
const PROJECT_CONFIG_FILE: &str = ".face-detect.toml";

/// File name of the weights looked up next to the executable.
pub const DEFAULT_MODEL_FILE: &str = "best.safetensors";

/// Top-level configuration structure.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Listener settings.
    pub server: ServerConfig,
    /// Model settings.
    pub model: ModelConfig,
    /// Inference parameters.
    pub detection: DetectionConfig,
    /// Response encoding settings.
    pub output: OutputConfig,
    /// Face blurring settings for `/process`.
    pub blur: BlurConfig,
}

/// Listener configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: Option<String>,
    /// Bind port.
    pub port: Option<u16>,
    /// Maximum request body size in bytes.
    pub max_upload_bytes: Option<usize>,
}

/// Model configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to the safetensors weights.
    pub path: Option<PathBuf>,
    /// Size variant: n, s, m, l or x.
    pub variant: Option<String>,
    /// Number of classes in the detection head.
    pub num_classes: Option<usize>,
    /// Device: "auto" or "cpu".
    pub device: Option<String>,
}

/// Inference parameter overrides.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Minimum class score (0.0-1.0).
    pub confidence_threshold: Option<f32>,
    /// NMS overlap threshold (0.0-1.0).
    pub iou_threshold: Option<f32>,
    /// Maximum boxes per image.
    pub max_detections: Option<usize>,
    /// Long edge of the network input, a multiple of 32.
    pub image_size: Option<usize>,
}

/// Output configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// JPEG quality of the echoed image (1-100).
    pub jpeg_quality: Option<u8>,
}

/// Face blurring configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct BlurConfig {
    /// Gaussian sigma applied to each face region.
    pub sigma: Option<f32>,
    /// JPEG quality of the blurred image (1-100).
    pub jpeg_quality: Option<u8>,
}

impl AppConfig {
    /// Load configuration from XDG and project-local files.
    ///
    /// Priority (lowest to highest):
    /// 1. XDG config: `~/.config/face-detect/config.toml`
    /// 2. Project-local: `.face-detect.toml` (searched up from cwd)
    ///
    /// Missing files are silently ignored. If the merged values are invalid
    /// a warning is logged and the built-in defaults are used instead.
    pub fn load() -> Self {
        let mut config = Self::default();

        // Load XDG config (lowest priority)
        if let Some(xdg_path) = xdg_config_path() {
            if xdg_path.exists() {
                info!("Loading XDG config: {}", xdg_path.display());
                if let Some(xdg_config) = load_file(&xdg_path) {
                    config = xdg_config;
                }
            } else {
                debug!("XDG config not found: {}", xdg_path.display());
            }
        }

        // Load project-local config (higher priority, merged)
        if let Some(project_path) = find_project_config() {
            info!("Loading project config: {}", project_path.display());
            if let Some(project_config) = load_file(&project_path) {
                config.merge(project_config);
            }
        }

        if let Err(e) = config.validate() {
            warn!("Ignoring config files: {e}");
            return Self::default();
        }

        config
    }

    /// Validate configuration values are within acceptable ranges.
    fn validate(&self) -> Result<(), String> {
        self.detection_params()
            .validate()
            .map_err(|e| format!("detection.{e}"))?;

        if let Some(ref v) = self.model.variant {
            v.parse::<Variant>().map_err(|e| format!("model.variant: {e}"))?;
        }
        if let Some(ref d) = self.model.device {
            d.parse::<DevicePreference>()
                .map_err(|e| format!("model.device: {e}"))?;
        }
        if self.model.num_classes == Some(0) {
            return Err("model.num_classes must be at least 1".to_string());
        }
        if self.server.max_upload_bytes == Some(0) {
            return Err("server.max_upload_bytes must be at least 1".to_string());
        }
        if let Some(q) = self.output.jpeg_quality {
            if !(1..=100).contains(&q) {
                return Err(format!("output.jpeg_quality must be 1-100, got {q}"));
            }
        }
        if let Some(q) = self.blur.jpeg_quality {
            if !(1..=100).contains(&q) {
                return Err(format!("blur.jpeg_quality must be 1-100, got {q}"));
            }
        }
        if let Some(sigma) = self.blur.sigma {
            if !(sigma.is_finite() && sigma > 0.0) {
                return Err(format!("blur.sigma must be positive, got {sigma}"));
            }
        }

        Ok(())
    }

    /// Merge another config into this one.
    /// Values from `other` override values in `self` when present.
    fn merge(&mut self, other: Self) {
        // Server
        self.server.host = other.server.host.or_else(|| self.server.host.take());
        self.server.port = other.server.port.or(self.server.port);
        self.server.max_upload_bytes = other
            .server
            .max_upload_bytes
            .or(self.server.max_upload_bytes);

        // Model
        self.model.path = other.model.path.or_else(|| self.model.path.take());
        self.model.variant = other.model.variant.or_else(|| self.model.variant.take());
        self.model.num_classes = other.model.num_classes.or(self.model.num_classes);
        self.model.device = other.model.device.or_else(|| self.model.device.take());

        // Detection
        self.detection.confidence_threshold = other
            .detection
            .confidence_threshold
            .or(self.detection.confidence_threshold);
        self.detection.iou_threshold = other
            .detection
            .iou_threshold
            .or(self.detection.iou_threshold);
        self.detection.max_detections = other
            .detection
            .max_detections
            .or(self.detection.max_detections);
        self.detection.image_size = other.detection.image_size.or(self.detection.image_size);

        // Output
        self.output.jpeg_quality = other.output.jpeg_quality.or(self.output.jpeg_quality);

        // Blur
        self.blur.sigma = other.blur.sigma.or(self.blur.sigma);
        self.blur.jpeg_quality = other.blur.jpeg_quality.or(self.blur.jpeg_quality);
    }

    /// Inference parameters with unset values taken from the defaults.
    #[must_use]
    pub fn detection_params(&self) -> DetectionParams {
        let defaults = DetectionParams::default();
        DetectionParams {
            confidence_threshold: self
                .detection
                .confidence_threshold
                .unwrap_or(defaults.confidence_threshold),
            iou_threshold: self
                .detection
                .iou_threshold
                .unwrap_or(defaults.iou_threshold),
            max_detections: self
                .detection
                .max_detections
                .unwrap_or(defaults.max_detections),
            image_size: self.detection.image_size.unwrap_or(defaults.image_size),
        }
    }
}

/// Weights path used when neither config nor CLI names one:
/// `best.safetensors` in the directory of the running executable.
#[must_use]
pub fn default_model_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_MODEL_FILE)))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_FILE))
}

/// Get the XDG config file path.
fn xdg_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("face-detect").join("config.toml"))
}

/// Find project-local config by searching up from current directory.
fn find_project_config() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_config_in_parents(&cwd)
}

/// Search for `.face-detect.toml` in the given directory and its parents.
fn find_config_in_parents(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);

    while let Some(dir) = current {
        let config_path = dir.join(PROJECT_CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }
        current = dir.parent();
    }

    None
}

/// Load and parse a TOML config file.
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return None;
        }
    };

    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!("Failed to parse config file {}: {}", path.display(), e);
            None
        }
    }
}
