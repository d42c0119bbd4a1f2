//! CLI module for Tally
//!
//! Command-line interface definitions and handlers for the usage reconciler.
//!
//! # Commands
//!
//! - `reconcile` - Run one reconciliation batch (the cron entry point)
//! - `status` - Show every run's verification status
//! - `export` - Emit verified totals for the report pipeline
//! - `config` - Configuration utilities (init)
//! - `completions` - Generate shell completions
//!
//! # Example
//!
//! ```bash
//! # Poll every run that is due
//! TALLY_ADMIN_KEY=... tally reconcile -c tally.toml
//!
//! # Show runs still waiting on stable data
//! tally status --status pending
//!
//! # Generate shell completions
//! tally completions bash > ~/.bash_completion.d/tally
//! ```

pub mod completions;
pub mod config;
pub mod export;
pub mod output;
pub mod reconcile;
pub mod status;

pub use completions::handle_completions;
pub use config::handle_config_init;
pub use export::handle_export;
pub use reconcile::run_reconcile;
pub use status::handle_status;

use crate::config::ReconcilerConfig;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Tally - run-level usage reconciliation
#[derive(Parser, Debug)]
#[command(
    name = "tally",
    version,
    about = "Reconcile benchmark runs against an eventually-consistent usage API"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll the usage API for every run that is due
    Reconcile(ReconcileArgs),
    /// Show verification status of all runs
    Status(StatusArgs),
    /// Export verified run totals as JSON
    Export(ExportArgs),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Where to find configuration and run records.
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "tally.toml")]
    pub config: PathBuf,

    /// Override the run records directory
    #[arg(long)]
    pub runs_dir: Option<PathBuf>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "TALLY_LOG_LEVEL")]
    pub log_level: Option<String>,
}

impl StoreArgs {
    /// Load configuration with environment and CLI overrides.
    ///
    /// A missing config file falls back to defaults; validation is left to
    /// the caller since read-only commands don't need framework keys.
    pub fn load_config(&self) -> Result<ReconcilerConfig, Box<dyn std::error::Error>> {
        let mut config = if self.config.exists() {
            ReconcilerConfig::load(Some(&self.config))?
        } else {
            tracing::debug!(path = %self.config.display(), "Config file not found, using defaults");
            ReconcilerConfig::default()
        };

        config = config.with_env_overrides();

        if let Some(ref runs_dir) = self.runs_dir {
            config.store.runs_dir = runs_dir.clone();
        }
        if let Some(ref log_level) = self.log_level {
            config.logging.level = log_level.clone();
        }

        Ok(config)
    }
}

#[derive(Args, Debug)]
pub struct ReconcileArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Re-poll runs that are already verified
    #[arg(long)]
    pub include_verified: bool,

    /// Retry runs previously given up on as stale
    #[arg(long)]
    pub include_stale: bool,

    /// Output the batch report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Filter by status (pending, data_not_available, warning, verified, failed, stale)
    #[arg(short, long)]
    pub status: Option<String>,

    /// Filter by framework
    #[arg(short, long)]
    pub framework: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Write JSON to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init(ConfigInitArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = "tally.toml")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
