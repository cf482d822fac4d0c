//! `status` command implementation

use super::{Cli, CliError};
use crate::resume::StateManager;
use clap::Args;

/// `status` command arguments
#[derive(Args, Debug, Default)]
pub struct StatusCommand {
    /// Only show this project
    #[arg(short, long, value_name = "KEY")]
    pub project: Option<String>,
}

impl StatusCommand {
    /// Print one line per checkpointed project and return them.
    pub fn execute(&self, cli: &Cli) -> Result<Vec<String>, CliError> {
        let config = cli.base_config()?;
        let state = StateManager::open(&config.checkpoint_path)?;
        let lines = self.describe(&state);

        if lines.is_empty() {
            println!("No progress recorded in {}", state.path().display());
        }
        for line in &lines {
            println!("{line}");
        }
        Ok(lines)
    }

    /// Render the checkpoint of each selected project.
    pub fn describe(&self, state: &StateManager) -> Vec<String> {
        state
            .checkpoints()
            .iter()
            .filter(|(project, _)| {
                self.project
                    .as_deref()
                    .map_or(true, |wanted| wanted.eq_ignore_ascii_case(project))
            })
            .map(|(project, checkpoint)| {
                format!(
                    "{project}: {} issues completed, next page {} (offset {}), updated {}",
                    checkpoint.completed_count(),
                    checkpoint.last_page_index(),
                    checkpoint
                        .last_offset()
                        .map_or_else(|| "-".to_string(), |o| o.to_string()),
                    checkpoint.updated_at().format("%Y-%m-%d %H:%M:%S UTC")
                )
            })
            .collect()
    }
}
