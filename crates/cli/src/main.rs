//! Tessera CLI, the main entry point.
//!
//! Commands:
//! - `compose`   : Compose a system prompt for one message
//! - `instincts` : List stored instincts with their live confidence
//! - `rules`     : Show the active conflict rule table
//! - `doctor`    : Diagnose configuration and store health

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "tessera",
    about = "Tessera: layered system prompt composer",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.tessera/config.toml)
    #[arg(short, long, global = true, env = "TESSERA_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose the system prompt for a message
    Compose {
        /// The latest user message
        #[arg(short, long)]
        message: String,

        /// Conversation thread id
        #[arg(short, long, default_value = "cli")]
        thread: String,

        /// Delivery channel (selects formatting rules)
        #[arg(long, default_value = "cli")]
        channel: String,

        /// Number of prior turns in the conversation
        #[arg(long, default_value_t = 1)]
        turn: usize,

        /// Print the prompt and allocation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List active instincts with stored, effective, and calibrated confidence
    Instincts {
        /// Only instincts that apply to this thread
        #[arg(short, long, default_value = "cli")]
        thread: String,
    },

    /// Show the active conflict rules
    Rules,

    /// Diagnose configuration and store health
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Compose {
            message,
            thread,
            channel,
            turn,
            json,
        } => commands::compose::run(config, message, thread, channel, turn, json).await?,
        Commands::Instincts { thread } => commands::instincts::run(config, thread).await?,
        Commands::Rules => commands::rules::run(config)?,
        Commands::Doctor => commands::doctor::run(config).await?,
    }

    Ok(())
}
