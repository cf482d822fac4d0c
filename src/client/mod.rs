//! Remote issue sources
//!
//! The orchestrator only talks to an [`IssueSource`]. [`JiraHttpClient`] is
//! the production implementation; tests substitute in-memory sources.

use crate::ingest::failure::TerminalError;
use crate::IssueRecord;
use async_trait::async_trait;

pub mod jira_http;
pub mod jira_parser;

pub use crate::resume::checkpoint::PageCursor;
pub use jira_http::{ClientBuildError, JiraHttpClient};
pub use jira_parser::JiraParser;

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Issues in API order
    pub items: Vec<IssueRecord>,
    /// Total the server claims to have. Advisory only.
    pub total_reported: u64,
    /// Offset the server says this page starts at
    pub start_at: u64,
}

impl Page {
    /// Whether the page carried no items. This is the only completion signal.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of items on the page
    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// Source of paginated issues.
///
/// Each call runs its own retry lifecycle and reports failure as a single
/// [`TerminalError`].
#[async_trait]
pub trait IssueSource: Send + Sync {
    /// Verify the remote end answers before any project is walked.
    async fn check_connection(&self) -> Result<(), TerminalError>;

    /// Fetch one page of a project's issues.
    ///
    /// # Arguments
    /// * `project` - Project key (e.g., "KAFKA")
    /// * `cursor` - Page position to fetch
    async fn fetch_page(&self, project: &str, cursor: PageCursor) -> Result<Page, TerminalError>;

    /// Fetch the full record of one issue.
    ///
    /// # Arguments
    /// * `key` - Issue key (e.g., "KAFKA-1234")
    async fn fetch_detail(&self, key: &str) -> Result<IssueRecord, TerminalError>;
}
