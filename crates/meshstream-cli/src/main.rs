//! Meshstream CLI - Headless Volumetric Stream Player
//!
//! Features:
//! - Manifest inspection
//! - Full session playback with progress reporting
//! - Sync verdict and telemetry output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod logging;
mod output;

/// Meshstream CLI - Volumetric video toolkit
#[derive(Parser)]
#[command(name = "meshstream")]
#[command(version)]
#[command(about = "Inspect and play volumetric video streams", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json, table)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Log format (pretty, json)
    #[arg(long, default_value = "pretty")]
    log_format: String,

    /// JSON file with stream configuration overrides
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and parse a manifest, then print the stream plan
    Inspect {
        /// Base URL the manifest and its media are resolved against
        base_url: String,

        /// Manifest file name under the base URL
        manifest: String,
    },

    /// Load every segment and the video track, then run the sync check
    Play {
        /// Base URL the manifest and its media are resolved against
        base_url: String,

        /// Manifest file name under the base URL
        manifest: String,

        /// Print the telemetry events collected during the session
        #[arg(long)]
        events: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    logging::init_logging(level, &cli.log_format)?;
    meshstream_core::init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Inspect { base_url, manifest } => {
            commands::inspect(&config, &base_url, &manifest, &cli.format).await?;
        }
        Commands::Play {
            base_url,
            manifest,
            events,
        } => {
            let healthy = commands::play(&config, &base_url, &manifest, events, &cli.format).await?;
            if !healthy {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
