//! Inspect command - print what a weights file contains.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use face_detect_core::inference::ModelReport;
use face_detect_server::config::{default_model_path, AppConfig};

/// Arguments for the inspect command
#[derive(Args, Clone, Default)]
pub struct InspectArgs {
    /// Weights file (defaults to the configured model path)
    pub path: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// List every tensor with dtype and shape
    #[arg(long)]
    pub tensors: bool,
}

impl InspectArgs {
    /// Falls back to the model path from the config files.
    #[must_use]
    pub fn with_config(mut args: Self, config: &AppConfig) -> Self {
        if args.path.is_none() {
            args.path.clone_from(&config.model.path);
        }
        args
    }
}

/// Run the inspect command.
pub fn run(args: &InspectArgs) -> Result<()> {
    let path = args.path.clone().unwrap_or_else(default_model_path);
    let mut report = ModelReport::from_file(&path)?;

    if !args.tensors {
        report.tensors.clear();
    }

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{json}");
        return Ok(());
    }

    print!("{report}");
    if args.tensors {
        println!();
        println!("Tensors:");
        for tensor in &report.tensors {
            println!("  {} {} {:?}", tensor.name, tensor.dtype, tensor.shape);
        }
    }

    Ok(())
}
