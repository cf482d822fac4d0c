//! # Jira Ingest Library
//!
//! Resumable ingestion of issues from the Jira REST API. Designed to run for
//! hours against a throttled public instance and to pick up exactly where it
//! stopped after a crash or Ctrl+C.
//!
//! ## Features
//!
//! - **Rate Limiting**: Continuous-refill token bucket on a monotonic clock
//! - **Retry Engine**: Failure classification, exponential backoff with jitter, Retry-After support
//! - **Checkpointing**: Per-project completed-key sets persisted with atomic file swaps
//! - **Pagination**: Page-by-page orchestration where an empty page is the only completion signal
//! - **Graceful Shutdown**: Interrupts flush the sink and persist the checkpoint before exiting
//!
//! ## Quick Start
//!
//! ```no_run
//! use jira_ingest::ingest::{IngestConfig, PaginationOrchestrator};
//! use jira_ingest::output::jsonl::JsonlSink;
//! use jira_ingest::shutdown::ShutdownCoordinator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = IngestConfig {
//!     projects: vec!["KAFKA".to_string()],
//!     ..IngestConfig::default()
//! };
//!
//! let mut sink = JsonlSink::open(&config.output_path, config.batch_size)?;
//! let mut orchestrator =
//!     PaginationOrchestrator::from_config(config, ShutdownCoordinator::shared())?;
//! let summary = orchestrator.run(&mut sink).await?;
//! println!("emitted {} issues", summary.total_emitted());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`ingest`] - Configuration, rate limiter, retry engine and the pagination orchestrator
//! - [`client`] - The [`client::IssueSource`] seam and its Jira HTTP implementation
//! - [`resume`] - Checkpoint model and the crash-safe state manager
//! - [`output`] - Record sinks
//! - [`shutdown`] - Cooperative cancellation
//! - [`metrics`] - Attempt metrics and the Prometheus exporter

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};

/// CLI command implementations
pub mod cli;

/// Remote issue sources
pub mod client;

/// Ingestion engine
pub mod ingest;

/// Metrics collection
pub mod metrics;

/// Record sinks
pub mod output;

/// Resume capability for ingestion runs
pub mod resume;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

// Re-export commonly used types
pub use ingest::{IngestConfig, IngestError, PaginationOrchestrator};

/// A single issue as fetched from the tracker.
///
/// Every projected field falls back to an empty value when the payload omits
/// it or sends `null`. The untouched payload is kept in [`IssueRecord::raw`]
/// for downstream transformers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IssueRecord {
    /// Stable issue key (e.g., "KAFKA-1234")
    pub key: String,
    /// One-line summary
    pub summary: String,
    /// Description body (markup as delivered by the API)
    pub description: String,
    /// Workflow status name
    pub status: String,
    /// Priority name
    pub priority: String,
    /// Assignee display name
    pub assignee: String,
    /// Reporter display name
    pub reporter: String,
    /// Creation timestamp as delivered by the API
    pub created: String,
    /// Last update timestamp as delivered by the API
    pub updated: String,
    /// Resolution timestamp, empty while unresolved
    pub resolution_date: String,
    /// Free-form labels
    pub labels: Vec<String>,
    /// Component names
    pub components: Vec<String>,
    /// Fix version names
    pub fix_versions: Vec<String>,
    /// Issue type name
    pub issue_type: String,
    /// Owning project
    pub project: ProjectRef,
    /// Comment thread in API order
    pub comments: Vec<IssueComment>,
    /// Unmodified API payload
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl IssueRecord {
    /// Whether the record carries a usable key
    pub fn has_key(&self) -> bool {
        !self.key.trim().is_empty()
    }
}

/// Project reference embedded in an issue
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectRef {
    /// Project key (e.g., "KAFKA")
    pub key: String,
    /// Project display name
    pub name: String,
}

/// A single comment on an issue
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IssueComment {
    /// Author display name
    pub author: String,
    /// Comment body
    pub body: String,
    /// Creation timestamp as delivered by the API
    pub created: String,
}
