//! Main entry point for the jira-ingest CLI

use clap::Parser;
use jira_ingest::cli::{Cli, Commands};
use jira_ingest::shutdown::ShutdownCoordinator;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    // Check if JSON output is requested via environment variable
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jira_ingest=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    // Ctrl+C stops the run after the current item; progress is flushed first
    let shutdown = ShutdownCoordinator::shared();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl+C received - saving progress...");
                shutdown.request_shutdown();
            }
        }
    });

    let result = match &cli.command {
        Commands::Run(args) => args
            .execute(&cli, shutdown.clone())
            .await
            .map(|_| ())
            .map_err(anyhow::Error::from),
        Commands::Status(status) => status
            .execute(&cli)
            .map(|_| ())
            .map_err(anyhow::Error::from),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }
}
