//! Pagination orchestrator
//!
//! Walks every configured project page by page. For each item on a page it
//! skips keys the checkpoint already holds, fetches the detail of the rest,
//! hands the record to the sink and then records the key as done. A project
//! ends on the first empty page, on the safety cap, on a terminal error, or
//! on shutdown. Issues whose detail fetch was skipped stay unmarked and the
//! stored cursor does not move past their page, so a later run retries them.

use super::config::IngestConfig;
use super::failure::{ErrorKind, TerminalError};
use super::outcome::{IngestSummary, ProjectOutcome, ProjectState};
use super::progress::ProjectProgress;
use super::retry::{AttemptObserver, TracingObserver};
use super::IngestError;
use crate::client::{IssueSource, JiraHttpClient, PageCursor};
use crate::output::RecordSink;
use crate::resume::StateManager;
use crate::shutdown::SharedShutdown;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Top-level control loop of an ingestion run.
pub struct PaginationOrchestrator<S> {
    config: IngestConfig,
    source: S,
    state: StateManager,
    shutdown: SharedShutdown,
}

impl PaginationOrchestrator<JiraHttpClient> {
    /// Build the production stack: HTTP client, limiter, retry engine and
    /// the checkpoint at `config.checkpoint_path`.
    ///
    /// The configuration is validated before anything else is created.
    pub fn from_config(config: IngestConfig, shutdown: SharedShutdown) -> Result<Self, IngestError> {
        Self::from_config_with_observer(config, shutdown, Arc::new(TracingObserver))
    }

    /// Same as [`from_config`](Self::from_config) with a custom attempt observer.
    pub fn from_config_with_observer(
        config: IngestConfig,
        shutdown: SharedShutdown,
        observer: Arc<dyn AttemptObserver>,
    ) -> Result<Self, IngestError> {
        config.validate()?;
        let source = JiraHttpClient::from_config(&config, shutdown.clone(), observer)?;
        let state = StateManager::open(&config.checkpoint_path)?;
        Self::new(config, source, state, shutdown)
    }
}

impl<S: IssueSource> PaginationOrchestrator<S> {
    /// Assemble an orchestrator from its parts.
    ///
    /// # Errors
    /// Returns [`IngestError::Config`] if `config` does not validate.
    pub fn new(
        config: IngestConfig,
        source: S,
        state: StateManager,
        shutdown: SharedShutdown,
    ) -> Result<Self, IngestError> {
        config.validate()?;
        Ok(Self {
            config,
            source,
            state,
            shutdown,
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Issue source in use
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Checkpoint state
    pub fn state(&self) -> &StateManager {
        &self.state
    }

    /// Mutable checkpoint state, e.g. to reset it before a run
    pub fn state_mut(&mut self) -> &mut StateManager {
        &mut self.state
    }

    /// Process every configured project in order.
    ///
    /// Aborted projects do not stop the run. On shutdown the sink and the
    /// checkpoint are flushed and the summary is returned with
    /// `interrupted` set.
    ///
    /// The source is asked to confirm connectivity once before the first
    /// project starts.
    ///
    /// # Errors
    /// [`IngestError::Unreachable`] if the connection check fails terminally.
    /// Failing to write the sink or the checkpoint is fatal: continuing would
    /// break the emitted-at-most-once contract.
    pub async fn run(&mut self, sink: &mut dyn RecordSink) -> Result<IngestSummary, IngestError> {
        let projects = self.config.projects.clone();
        let mut summary = IngestSummary::default();

        info!(
            projects = projects.len(),
            checkpoint = %self.state.path().display(),
            "Starting ingestion run"
        );

        if !self.shutdown.is_shutdown_requested() {
            match self.source.check_connection().await {
                Ok(()) => {}
                Err(err) if err.is_interrupted() => summary.interrupted = true,
                Err(err) => {
                    error!(
                        error_kind = %err.kind,
                        attempts = err.attempts,
                        error = %err.message,
                        "Connection check failed, nothing was fetched"
                    );
                    return Err(IngestError::Unreachable(err));
                }
            }
        }

        for project in &projects {
            if summary.interrupted || self.shutdown.is_shutdown_requested() {
                summary.interrupted = true;
                break;
            }

            let span = info_span!("project", project = %project);
            let outcome = self.run_project(project, sink).instrument(span).await?;

            info!(
                project = %outcome.project,
                state = %outcome.state,
                emitted = outcome.emitted,
                skipped_done = outcome.skipped_done,
                skipped_failed = outcome.skipped_failed,
                pages = outcome.pages_fetched,
                "Project finished"
            );
            crate::metrics::record_project_outcome(&outcome);

            let interrupted = outcome.state == ProjectState::Interrupted;
            summary.projects.push(outcome);
            if interrupted {
                summary.interrupted = true;
                break;
            }
        }

        if summary.interrupted {
            info!("Shutdown requested - flushing output and checkpoint before exiting");
        }
        self.flush_all(sink)?;

        info!(
            emitted = summary.total_emitted(),
            skipped_done = summary.total_skipped_done(),
            interrupted = summary.interrupted,
            "Ingestion run finished"
        );
        Ok(summary)
    }

    async fn run_project(
        &mut self,
        project: &str,
        sink: &mut dyn RecordSink,
    ) -> Result<ProjectOutcome, IngestError> {
        let mut outcome = ProjectOutcome::new(project);
        let mut cursor = self.state.resume_cursor(project, self.config.page_size);
        let mut progress = ProjectProgress::new(project, self.state.completed_count(project));
        // First page whose detail fetch was skipped. The stored cursor stays
        // there so the next run fetches that page again.
        let mut held_at: Option<PageCursor> = None;

        info!(
            page_index = cursor.page_index,
            offset = cursor.offset,
            completed = self.state.completed_count(project),
            "Starting project"
        );

        loop {
            if self.shutdown.is_shutdown_requested() {
                return Ok(outcome.finish(ProjectState::Interrupted));
            }
            if self.cap_reached(project) {
                return Ok(self.finish_at_cap(project, outcome));
            }

            let page = match self.source.fetch_page(project, cursor).await {
                Ok(page) => page,
                Err(err) if err.is_interrupted() => {
                    return Ok(outcome.finish(ProjectState::Interrupted))
                }
                Err(err) => {
                    log_abort(project, None, &err);
                    return Ok(outcome.finish(ProjectState::Aborted { kind: err.kind }));
                }
            };
            outcome.pages_fetched += 1;
            progress.set_total_reported(page.total_reported);

            if page.is_empty() {
                if page.total_reported > cursor.offset {
                    info!(
                        total_reported = page.total_reported,
                        offset = cursor.offset,
                        "Empty page before the reported total, treating project as complete"
                    );
                }
                info!(page_index = cursor.page_index, "Reached empty page, project complete");
                return Ok(outcome.finish(ProjectState::Completed));
            }

            debug!(
                page_index = cursor.page_index,
                offset = cursor.offset,
                items = page.len(),
                "Processing page"
            );

            for item in &page.items {
                if self.shutdown.is_shutdown_requested() {
                    return Ok(outcome.finish(ProjectState::Interrupted));
                }

                if !item.has_key() {
                    warn!(
                        project,
                        error_kind = %ErrorKind::MalformedResponse,
                        page_index = cursor.page_index,
                        "Skipping search result without an issue key"
                    );
                    outcome.skipped_failed += 1;
                    continue;
                }
                let key = item.key.as_str();

                if self.state.is_done(project, key) {
                    debug!(project, key, "Already completed, skipping");
                    outcome.skipped_done += 1;
                    progress.update(1);
                    continue;
                }

                if self.cap_reached(project) {
                    return Ok(self.finish_at_cap(project, outcome));
                }

                match self.source.fetch_detail(key).await {
                    Ok(record) => {
                        sink.emit(&record)?;
                        self.state
                            .mark_done(project, key, held_at.unwrap_or(cursor))?;
                        outcome.emitted += 1;
                    }
                    Err(err) if err.is_interrupted() => {
                        return Ok(outcome.finish(ProjectState::Interrupted));
                    }
                    Err(err) if skips_item(err.kind) => {
                        warn!(
                            project,
                            key,
                            error_kind = %err.kind,
                            attempts = err.attempts,
                            error = %err.message,
                            "Skipping issue"
                        );
                        outcome.skipped_failed += 1;
                        held_at.get_or_insert(cursor);
                    }
                    Err(err) => {
                        log_abort(project, Some(key), &err);
                        return Ok(outcome.finish(ProjectState::Aborted { kind: err.kind }));
                    }
                }

                progress.update(1);
                if progress.should_emit_update() {
                    info!("{}", progress.format_progress());
                    progress.mark_emitted();
                }
            }

            cursor = cursor.advance(page.len());
            self.state
                .advance_cursor(project, held_at.unwrap_or(cursor))?;
        }
    }

    fn cap_reached(&self, project: &str) -> bool {
        self.state.completed_count(project) >= self.config.max_issues_per_project
    }

    fn finish_at_cap(&self, project: &str, outcome: ProjectOutcome) -> ProjectOutcome {
        info!(
            project,
            cap = self.config.max_issues_per_project,
            "Reached per-project safety cap"
        );
        outcome.finish(ProjectState::CapReached)
    }

    fn flush_all(&mut self, sink: &mut dyn RecordSink) -> Result<(), IngestError> {
        sink.flush()?;
        self.state.flush()?;
        Ok(())
    }
}

/// Terminal detail-fetch failures that cost one item rather than the project.
fn skips_item(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::NotFound | ErrorKind::Client | ErrorKind::MalformedResponse
    )
}

fn log_abort(project: &str, key: Option<&str>, err: &TerminalError) {
    error!(
        project,
        key = key.unwrap_or_default(),
        operation = %err.operation,
        error_kind = %err.kind,
        attempts = err.attempts,
        error = %err.message,
        "Aborting project"
    );
}
