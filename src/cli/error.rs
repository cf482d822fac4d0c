//! CLI error types and conversions

use crate::ingest::{ConfigError, IngestError};
use crate::metrics::MetricsError;
use crate::output::OutputError;
use crate::resume::ResumeError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Ingestion error
    #[error("{0}")]
    Ingest(#[from] IngestError),

    /// Output error
    #[error("output error: {0}")]
    Output(#[from] OutputError),

    /// Resume error
    #[error("checkpoint error: {0}")]
    Resume(#[from] ResumeError),

    /// Metrics exporter error
    #[error("metrics error: {0}")]
    Metrics(#[from] MetricsError),
}
