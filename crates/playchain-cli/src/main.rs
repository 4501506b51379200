//! Playchain CLI - Headless playback configuration tool
//!
//! Features:
//! - Configuration resolution from a page URL or a settings file
//! - Candidate resource URLs for every technology
//! - HTTP existence probing of a stream

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod output;

/// Playchain CLI - Stream playback toolkit
#[derive(Parser)]
#[command(name = "playchain")]
#[command(version)]
#[command(about = "Resolve and probe stream playback configurations", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json, table)
    #[arg(short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the playback configuration of an embedding page
    Resolve {
        /// Page URL carrying the player query parameters
        page: String,

        /// JSON settings object used instead of the query parameters
        #[arg(short, long)]
        settings: Option<PathBuf>,
    },

    /// List the candidate resource URLs for every technology
    Urls {
        /// Page URL carrying the player query parameters
        page: String,

        /// JSON settings object used instead of the query parameters
        #[arg(short, long)]
        settings: Option<PathBuf>,
    },

    /// Probe the stream over HTTP for each technology in play order
    Probe {
        /// Page URL carrying the player query parameters
        page: String,

        /// JSON settings object used instead of the query parameters
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// Only probe this technology (webrtc, hls, ll-hls, dash, vod)
        #[arg(short, long)]
        technology: Option<String>,

        /// Fail when no technology has a playable resource
        #[arg(long)]
        strict: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_writer(std::io::stderr)
        .init();

    playchain_core::init();

    match cli.command {
        Commands::Resolve { page, settings } => {
            commands::resolve(&page, settings.as_deref(), &cli.format)?;
        }
        Commands::Urls { page, settings } => {
            commands::urls(&page, settings.as_deref(), &cli.format)?;
        }
        Commands::Probe {
            page,
            settings,
            technology,
            strict,
        } => {
            commands::probe(
                &page,
                settings.as_deref(),
                technology.as_deref(),
                strict,
                &cli.format,
            )
            .await?;
        }
    }

    Ok(())
}
