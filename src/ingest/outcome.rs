//! Per-project results and the run summary

use super::failure::ErrorKind;
use std::fmt;

/// How a project run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectState {
    /// An empty page was reached
    Completed,
    /// The safety cap on completed issues was reached
    CapReached,
    /// A terminal error stopped the project; the run moved on
    Aborted {
        /// Kind of the terminal error
        kind: ErrorKind,
    },
    /// Shutdown was requested mid-project
    Interrupted,
}

impl ProjectState {
    /// Stable label used in logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::CapReached => "cap_reached",
            Self::Aborted { .. } => "aborted",
            Self::Interrupted => "interrupted",
        }
    }
}

impl fmt::Display for ProjectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aborted { kind } => write!(f, "aborted ({kind})"),
            other => f.write_str(other.label()),
        }
    }
}

/// Counters and final state of one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectOutcome {
    /// Project key
    pub project: String,
    /// Final state
    pub state: ProjectState,
    /// Issues emitted to the sink this run
    pub emitted: u64,
    /// Issues skipped because an earlier run completed them
    pub skipped_done: u64,
    /// Issues skipped after a non-retryable error
    pub skipped_failed: u64,
    /// Pages fetched, including the final empty one
    pub pages_fetched: u64,
}

impl ProjectOutcome {
    /// Fresh counters for `project`, provisionally completed.
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            state: ProjectState::Completed,
            emitted: 0,
            skipped_done: 0,
            skipped_failed: 0,
            pages_fetched: 0,
        }
    }

    /// Set the final state.
    pub fn finish(mut self, state: ProjectState) -> Self {
        self.state = state;
        self
    }
}

/// Result of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// Outcomes in processing order
    pub projects: Vec<ProjectOutcome>,
    /// Whether the run stopped on a shutdown request
    pub interrupted: bool,
}

impl IngestSummary {
    /// Issues emitted across all projects
    pub fn total_emitted(&self) -> u64 {
        self.projects.iter().map(|p| p.emitted).sum()
    }

    /// Issues skipped as already done across all projects
    pub fn total_skipped_done(&self) -> u64 {
        self.projects.iter().map(|p| p.skipped_done).sum()
    }

    /// Outcome of `project`, if it was reached
    pub fn project(&self, project: &str) -> Option<&ProjectOutcome> {
        self.projects.iter().find(|p| p.project == project)
    }

    /// Projects that ended in an abort
    pub fn aborted(&self) -> impl Iterator<Item = &ProjectOutcome> {
        self.projects
            .iter()
            .filter(|p| matches!(p.state, ProjectState::Aborted { .. }))
    }
}
