//! `run` command implementation

use super::{Cli, CliError};
use crate::ingest::{
    AttemptObserver, IngestConfig, IngestSummary, ObserverChain, PaginationOrchestrator,
    TracingObserver,
};
use crate::metrics::{self, MetricsObserver};
use crate::output::jsonl::JsonlSink;
use crate::shutdown::SharedShutdown;
use clap::Args;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// `run` command arguments
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Project key to ingest; repeat for several (replaces the configured list)
    #[arg(short, long = "project", value_name = "KEY")]
    pub projects: Vec<String>,

    /// REST API root (e.g., https://issues.apache.org/jira/rest/api/2)
    #[arg(long)]
    pub base_url: Option<String>,

    /// JSON-lines output file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Sustained request ceiling
    #[arg(long)]
    pub requests_per_second: Option<f64>,

    /// Attempts per remote call, first try included (range: 1-20)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=20))]
    pub max_attempts: Option<u32>,

    /// Issues requested per page
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Safety cap on completed issues per project
    #[arg(long)]
    pub max_issues: Option<u64>,

    /// Discard the checkpoint and truncate the output before starting
    #[arg(long, default_value_t = false)]
    pub fresh: bool,

    /// Serve Prometheus metrics on this address (e.g., 127.0.0.1:9090)
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,
}

impl RunArgs {
    /// Apply the command's overrides to `config` and validate the result.
    pub fn apply(&self, mut config: IngestConfig) -> Result<IngestConfig, CliError> {
        if !self.projects.is_empty() {
            config.projects = self
                .projects
                .iter()
                .map(|p| p.trim().to_uppercase())
                .collect();
        }
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(output) = &self.output {
            config.output_path = output.clone();
        }
        if let Some(rps) = self.requests_per_second {
            config.requests_per_second = rps;
        }
        if let Some(max_attempts) = self.max_attempts {
            config.max_attempts = max_attempts;
        }
        if let Some(page_size) = self.page_size {
            config.page_size = page_size;
        }
        if let Some(max_issues) = self.max_issues {
            config.max_issues_per_project = max_issues;
        }
        config.validate()?;
        Ok(config)
    }

    /// Execute the run.
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<IngestSummary, CliError> {
        let config = self.apply(cli.base_config()?)?;

        let observer: Arc<dyn AttemptObserver> = match self.metrics_addr {
            Some(addr) => {
                metrics::init_metrics(addr)?;
                Arc::new(
                    ObserverChain::new()
                        .with(Arc::new(TracingObserver))
                        .with(Arc::new(MetricsObserver)),
                )
            }
            None => Arc::new(TracingObserver),
        };

        let output_path = config.output_path.clone();
        let batch_size = config.batch_size;
        let mut orchestrator =
            PaginationOrchestrator::from_config_with_observer(config, shutdown, observer)?;

        let mut sink = if self.fresh {
            orchestrator.state_mut().reset()?;
            info!(output = %output_path.display(), "Fresh start requested, truncating output");
            JsonlSink::create(&output_path, batch_size)?
        } else {
            JsonlSink::open(&output_path, batch_size)?
        };

        let summary = orchestrator.run(&mut sink).await?;
        print_summary(&summary, &output_path);
        Ok(summary)
    }
}

fn print_summary(summary: &IngestSummary, output_path: &std::path::Path) {
    println!();
    for outcome in &summary.projects {
        println!(
            "{:<12} {:<24} emitted {:>6}  already done {:>6}  skipped {:>4}  pages {:>4}",
            outcome.project,
            outcome.state.to_string(),
            outcome.emitted,
            outcome.skipped_done,
            outcome.skipped_failed,
            outcome.pages_fetched
        );
    }
    println!(
        "Total emitted: {} -> {}{}",
        summary.total_emitted(),
        output_path.display(),
        if summary.interrupted {
            " (interrupted, rerun to resume)"
        } else {
            ""
        }
    );
}
