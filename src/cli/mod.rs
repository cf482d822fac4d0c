//! CLI command implementations

pub mod error;
pub mod run;
pub mod status;

pub use error::CliError;
pub use run::RunArgs;
pub use status::StatusCommand;

use crate::ingest::IngestConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Resumable Jira issue ingestion
#[derive(Parser, Debug)]
#[command(name = "jira-ingest", version, about)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// TOML configuration file; flags override its values
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Checkpoint file location
    #[arg(long, global = true)]
    pub checkpoint: Option<PathBuf>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch issues for the configured projects
    Run(RunArgs),

    /// Show what the checkpoint has recorded
    Status(StatusCommand),
}

impl Cli {
    /// Configuration from the file (or defaults) with global overrides applied.
    ///
    /// Not validated yet; command-specific overrides come first.
    pub fn base_config(&self) -> Result<IngestConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => IngestConfig::from_toml_file(path)?,
            None => IngestConfig::default(),
        };
        if let Some(checkpoint) = &self.checkpoint {
            config.checkpoint_path = checkpoint.clone();
        }
        Ok(config)
    }
}
