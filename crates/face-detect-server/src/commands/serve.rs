//! Serve command - load the model and run the HTTP service.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use face_detect_core::blur::{DEFAULT_BLUR_JPEG_QUALITY, DEFAULT_BLUR_SIGMA};
use face_detect_core::codec::DEFAULT_JPEG_QUALITY;
use face_detect_core::inference::{DevicePreference, Variant, YoloConfig, YoloFaceDetector};
use face_detect_server::config::{default_model_path, AppConfig};
use face_detect_server::state::DEFAULT_BODY_LIMIT;
use face_detect_server::{create_router, AppState};
use tokio::signal;
use tracing::{info, warn};

/// Hardcoded defaults for the listener.
mod defaults {
    pub const HOST: &str = "0.0.0.0";
    pub const PORT: u16 = 5000;
}

/// Arguments for the serve command.
#[derive(Args, Clone, Default)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to the safetensors weights
    #[arg(short, long, value_name = "PATH")]
    pub model: Option<PathBuf>,

    /// Model size variant (n, s, m, l, x)
    #[arg(long)]
    pub variant: Option<Variant>,

    /// Number of classes in the detection head
    #[arg(long)]
    pub num_classes: Option<usize>,

    /// Run inference on the CPU even if a GPU is available
    #[arg(long)]
    pub cpu: bool,

    /// Merged config (populated by `with_config`, not from CLI).
    #[arg(skip)]
    config: AppConfig,
}

impl ServeArgs {
    /// Apply configuration file values, respecting CLI precedence.
    ///
    /// Layering priority (lowest to highest):
    /// 1. Hardcoded defaults (in accessor methods)
    /// 2. Config file values (XDG, then project-local)
    /// 3. CLI arguments (already set on self)
    #[must_use]
    pub fn with_config(mut args: Self, config: &AppConfig) -> Self {
        if args.host.is_none() {
            args.host.clone_from(&config.server.host);
        }
        args.port = args.port.or(config.server.port);
        if args.model.is_none() {
            args.model.clone_from(&config.model.path);
        }
        // Config values were validated on load
        if args.variant.is_none() {
            args.variant = config.model.variant.as_deref().and_then(|v| v.parse().ok());
        }
        args.num_classes = args.num_classes.or(config.model.num_classes);
        if !args.cpu {
            args.cpu = config
                .model
                .device
                .as_deref()
                .and_then(|d| d.parse().ok())
                == Some(DevicePreference::Cpu);
        }

        args.config = config.clone();
        args
    }

    /// Bind address with fallback to `0.0.0.0:5000`.
    fn addr(&self) -> String {
        let host = self.host.as_deref().unwrap_or(defaults::HOST);
        let port = self.port.unwrap_or(defaults::PORT);
        format!("{host}:{port}")
    }

    /// Weights path with fallback to the file next to the executable.
    pub fn model_path(&self) -> PathBuf {
        self.model.clone().unwrap_or_else(default_model_path)
    }

    fn yolo_config(&self) -> YoloConfig {
        let device = if self.cpu {
            DevicePreference::Cpu
        } else {
            DevicePreference::Auto
        };
        YoloConfig::new(self.model_path())
            .with_variant(self.variant.unwrap_or_default())
            .with_num_classes(self.num_classes.unwrap_or(1))
            .with_device(device)
    }
}

/// Run the serve command.
///
/// Expects `args` to have been processed through `with_config()` first.
/// The model is loaded before the runtime starts; a load failure ends the
/// process without binding the port.
pub fn run(args: &ServeArgs) -> Result<()> {
    let detector = YoloFaceDetector::load(&args.yolo_config())
        .with_context(|| format!("Failed to load model {}", args.model_path().display()))?;
    info!("Model loaded");

    let state = AppState::new(Arc::new(detector))
        .with_params(args.config.detection_params())
        .with_jpeg_quality(args.config.output.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY))
        .with_blur(
            args.config.blur.sigma.unwrap_or(DEFAULT_BLUR_SIGMA),
            args.config
                .blur
                .jpeg_quality
                .unwrap_or(DEFAULT_BLUR_JPEG_QUALITY),
        )
        .with_body_limit(
            args.config
                .server
                .max_upload_bytes
                .unwrap_or(DEFAULT_BODY_LIMIT),
        );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(serve(state, args.addr()))
}

async fn serve(state: AppState, addr: String) -> Result<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        () = terminate => info!("Received SIGTERM, shutting down..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = ServeArgs::with_config(ServeArgs::default(), &AppConfig::default());
        assert_eq!(args.addr(), "0.0.0.0:5000");
        assert!(!args.cpu);

        let yolo = args.yolo_config();
        assert_eq!(yolo.variant, Variant::N);
        assert_eq!(yolo.num_classes, 1);
        assert_eq!(yolo.device, DevicePreference::Auto);
    }

    #[test]
    fn test_config_fills_unset_args() {
        let config: AppConfig = toml::from_str(
            r"
[server]
host = '127.0.0.1'
port = 9000

[model]
path = 'weights/face.safetensors'
variant = 'l'
num_classes = 3
device = 'cpu'
",
        )
        .unwrap_or_default();
        let args = ServeArgs::with_config(ServeArgs::default(), &config);

        assert_eq!(args.addr(), "127.0.0.1:9000");
        assert_eq!(args.model_path(), PathBuf::from("weights/face.safetensors"));
        let yolo = args.yolo_config();
        assert_eq!(yolo.variant, Variant::L);
        assert_eq!(yolo.num_classes, 3);
        assert_eq!(yolo.device, DevicePreference::Cpu);
    }

    #[test]
    fn test_cli_overrides_config() {
        let config: AppConfig = toml::from_str(
            r"
[server]
port = 9000

[model]
variant = 'l'
",
        )
        .unwrap_or_default();
        let cli = ServeArgs {
            port: Some(7000),
            variant: Some(Variant::S),
            ..ServeArgs::default()
        };
        let args = ServeArgs::with_config(cli, &config);

        assert_eq!(args.addr(), "0.0.0.0:7000");
        assert_eq!(args.yolo_config().variant, Variant::S);
    }
}
