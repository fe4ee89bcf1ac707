mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

// ============================================================================
// CLI Types
// ============================================================================

/// Swipe through a photo folder month by month and clean it up
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "swipe-review.json", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the months found in a folder with review progress
    Months {
        /// Folder to scan
        dir: PathBuf,

        /// Mark every month before this one (YYYY-M) as already reviewed
        #[arg(long, value_name = "YYYY-M")]
        complete_before: Option<String>,
    },

    /// Review one month interactively
    Review {
        /// Folder to scan
        dir: PathBuf,

        /// Month to review, e.g. 2019-6
        scope: String,

        /// Discard saved progress and start from the first item
        #[arg(long)]
        restart: bool,
    },

    /// Show lifetime statistics and achievements
    Stats,
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Months {
            dir,
            complete_before,
        } => commands::months::run(&cli.config, &dir, complete_before.as_deref()).await,
        Commands::Review {
            dir,
            scope,
            restart,
        } => commands::review::run(&cli.config, &dir, &scope, restart).await,
        Commands::Stats => commands::stats::run(&cli.config),
    }
}

// ============================================================================
// Initialization
// ============================================================================

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
