//! CLI command definitions and handlers.

pub mod inspect;
pub mod serve;

use clap::{Parser, Subcommand};

/// Face Detect - HTTP face detection service
#[derive(Parser)]
#[command(name = "face-detect")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Server arguments used when no subcommand is given.
    #[command(flatten)]
    pub serve: serve::ServeArgs,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP service (default)
    Serve(serve::ServeArgs),
    /// Print metadata of a weights file
    Inspect(inspect::InspectArgs),
}
