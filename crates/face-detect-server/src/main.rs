//! Face Detect - HTTP face detection service.

use std::process::ExitCode;

use clap::Parser;
use face_detect_server::config::AppConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::inspect::InspectArgs;
use commands::serve::ServeArgs;
use commands::{Cli, Commands};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("info"),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = AppConfig::load();

    let result = match cli.command {
        Some(Commands::Serve(args)) => commands::serve::run(&ServeArgs::with_config(args, &config)),
        Some(Commands::Inspect(args)) => {
            commands::inspect::run(&InspectArgs::with_config(args, &config))
        }
        None => commands::serve::run(&ServeArgs::with_config(cli.serve, &config)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
