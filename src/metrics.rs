//! Ingestion metrics
//!
//! Attempt-level counters are fed by [`MetricsObserver`], an
//! [`AttemptObserver`] plugged into the retry engine. Project-level counters
//! are recorded by the orchestrator when a project finishes. Without an
//! installed recorder every call here is a no-op.
//!
//! ## Architecture
//!
//! - Uses `metrics` crate for low-overhead metric collection
//! - Optional Prometheus exporter for a scrape endpoint (`--metrics-addr`)

use crate::ingest::outcome::ProjectOutcome;
use crate::ingest::retry::{AttemptEvent, AttemptObserver, AttemptOutcome};
use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

/// Attempts by operation and outcome
pub const ATTEMPTS_TOTAL: &str = "ingest_attempts_total";
/// Scheduled retries by operation and error kind
pub const RETRIES_TOTAL: &str = "ingest_retries_total";
/// Calls that ended in a terminal error, by operation and error kind
pub const FAILURES_TOTAL: &str = "ingest_failures_total";
/// Backoff sleeps
pub const BACKOFF_SECONDS: &str = "ingest_backoff_seconds";
/// Attempt latency
pub const ATTEMPT_DURATION_SECONDS: &str = "ingest_attempt_duration_seconds";
/// Issues emitted to the sink, by project
pub const ISSUES_EMITTED_TOTAL: &str = "ingest_issues_emitted_total";
/// Finished projects, by final state
pub const PROJECTS_TOTAL: &str = "ingest_projects_total";

/// Install the Prometheus exporter and register metric descriptions.
///
/// Call once at startup, from within a tokio runtime.
///
/// # Arguments
/// * `addr` - Socket address for the scrape endpoint (e.g., "0.0.0.0:9090")
pub fn init_metrics(addr: SocketAddr) -> Result<(), MetricsError> {
    info!(%addr, "Initializing metrics exporter");

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| MetricsError::Install(e.to_string()))?;

    describe_metrics();
    Ok(())
}

/// Register descriptions for every metric this crate emits.
pub fn describe_metrics() {
    describe_counter!(ATTEMPTS_TOTAL, Unit::Count, "Remote call attempts");
    describe_counter!(RETRIES_TOTAL, Unit::Count, "Retries scheduled after a retryable failure");
    describe_counter!(FAILURES_TOTAL, Unit::Count, "Remote calls ending in a terminal error");
    describe_histogram!(BACKOFF_SECONDS, Unit::Seconds, "Backoff sleep before a retry");
    describe_histogram!(ATTEMPT_DURATION_SECONDS, Unit::Seconds, "Duration of one attempt");
    describe_counter!(ISSUES_EMITTED_TOTAL, Unit::Count, "Issues written to the sink");
    describe_counter!(PROJECTS_TOTAL, Unit::Count, "Projects finished, by final state");
}

/// Records retry-engine attempts as metrics.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsObserver;

impl AttemptObserver for MetricsObserver {
    fn on_attempt(&self, event: &AttemptEvent<'_>) {
        counter!(
            ATTEMPTS_TOTAL,
            "operation" => event.operation,
            "outcome" => event.outcome.label(),
        )
        .increment(1);

        histogram!(ATTEMPT_DURATION_SECONDS, "operation" => event.operation)
            .record(event.elapsed.as_secs_f64());

        match &event.outcome {
            AttemptOutcome::Succeeded => {}
            AttemptOutcome::Retrying { kind, delay, .. } => {
                counter!(
                    RETRIES_TOTAL,
                    "operation" => event.operation,
                    "error_kind" => kind.as_str(),
                )
                .increment(1);
                histogram!(BACKOFF_SECONDS, "operation" => event.operation)
                    .record(delay.as_secs_f64());
            }
            AttemptOutcome::GaveUp { kind } => {
                counter!(
                    FAILURES_TOTAL,
                    "operation" => event.operation,
                    "error_kind" => kind.as_str(),
                )
                .increment(1);
            }
        }
    }
}

/// Record the result of one project run.
pub fn record_project_outcome(outcome: &ProjectOutcome) {
    counter!(ISSUES_EMITTED_TOTAL, "project" => outcome.project.clone())
        .increment(outcome.emitted);
    counter!(PROJECTS_TOTAL, "state" => outcome.state.label()).increment(1);
}

/// Metrics setup errors
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// The exporter could not be installed (port in use, recorder already set)
    #[error("failed to install Prometheus exporter: {0}")]
    Install(String),
}
