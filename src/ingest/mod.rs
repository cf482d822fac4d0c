//! Ingestion engine
//!
//! This module holds the resilient fetch engine: configuration, rate
//! limiting, retry with backoff, and the orchestrator that ties them to the
//! checkpoint and the output sink.
//!
//! # Overview
//!
//! 1. **Configuration**: Build and validate an [`config::IngestConfig`]
//! 2. **Rate Limiting**: Every attempt takes a token from [`rate_limit::RateLimiter`]
//! 3. **Retries**: Every remote call runs inside [`retry::RetryEngine::execute`]
//! 4. **Orchestration**: [`orchestrator::PaginationOrchestrator`] walks projects and pages
//! 5. **Resume Support**: Each emitted issue is checkpointed before the next one starts
//!
//! # Error Handling
//!
//! Remote failures are classified into [`failure::ErrorKind`]. Retryable kinds
//! never leave the retry engine except as one [`failure::TerminalError`]; the
//! orchestrator turns terminal errors into skipped items or aborted projects.
//! Only configuration, checkpoint and output failures surface as
//! [`IngestError`].
//!
//! # Related Modules
//!
//! - [`crate::client`] - Issue sources
//! - [`crate::output`] - Record sinks
//! - [`crate::resume`] - Checkpoint persistence

pub mod config;
pub mod failure;
pub mod orchestrator;
pub mod outcome;
pub mod progress;
pub mod rate_limit;
pub mod retry;

pub use config::{ConfigError, IngestConfig};
pub use failure::{ErrorKind, FetchFailure, TerminalError};
pub use orchestrator::PaginationOrchestrator;
pub use outcome::{IngestSummary, ProjectOutcome, ProjectState};
pub use rate_limit::{RateLimitError, RateLimiter};
pub use retry::{
    AttemptEvent, AttemptObserver, AttemptOutcome, NoopObserver, ObserverChain, RetryEngine,
    RetryPolicy, TracingObserver,
};

use crate::client::ClientBuildError;
use crate::output::OutputError;
use crate::resume::ResumeError;

/// Errors that stop an ingestion run
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Configuration rejected
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// HTTP client could not be built
    #[error("client error: {0}")]
    Client(#[from] ClientBuildError),

    /// Checkpoint could not be read or written
    #[error("checkpoint error: {0}")]
    Resume(#[from] ResumeError),

    /// Output sink failed
    #[error("output error: {0}")]
    Output(#[from] OutputError),

    /// Remote API did not answer the connection check
    #[error("Jira server unreachable: {0}")]
    Unreachable(#[source] TerminalError),
}

impl IngestError {
    /// Taxonomy kind of the error, where one applies
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Config(_) | Self::Client(ClientBuildError::BaseUrl(_)) => {
                Some(ErrorKind::InvalidConfiguration)
            }
            Self::Unreachable(err) => Some(err.kind),
            _ => None,
        }
    }
}
