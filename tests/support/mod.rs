//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use jira_ingest::client::{IssueSource, Page, PageCursor};
use jira_ingest::ingest::{ErrorKind, FetchFailure, IngestConfig, TerminalError};
use jira_ingest::shutdown::SharedShutdown;
use jira_ingest::IssueRecord;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A remote call made against a [`FakeSource`]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Page { project: String, cursor: PageCursor },
    Detail { key: String },
}

/// In-memory issue source with scripted pages and failures.
///
/// Pages are addressed by page index; any index beyond the scripted pages
/// returns an empty page.
#[derive(Default)]
pub struct FakeSource {
    pages: HashMap<String, Vec<Vec<IssueRecord>>>,
    total_reported: HashMap<String, u64>,
    page_failures: HashMap<String, ErrorKind>,
    detail_failures: HashMap<String, ErrorKind>,
    interrupt_after: Option<(usize, SharedShutdown)>,
    connection_failure: Option<ErrorKind>,
    connection_checks: AtomicUsize,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the pages of `project` from lists of issue keys.
    pub fn with_pages(mut self, project: &str, pages: &[&[&str]]) -> Self {
        let pages = pages
            .iter()
            .map(|keys| keys.iter().map(|key| issue(key)).collect())
            .collect();
        self.pages.insert(project.to_string(), pages);
        self
    }

    /// Script pages made of arbitrary records.
    pub fn with_records(mut self, project: &str, pages: Vec<Vec<IssueRecord>>) -> Self {
        self.pages.insert(project.to_string(), pages);
        self
    }

    /// Total the server claims for `project` on every page.
    pub fn with_total(mut self, project: &str, total: u64) -> Self {
        self.total_reported.insert(project.to_string(), total);
        self
    }

    /// Every page request of `project` fails terminally with `kind`.
    pub fn failing_page(mut self, project: &str, kind: ErrorKind) -> Self {
        self.page_failures.insert(project.to_string(), kind);
        self
    }

    /// The detail request of `key` fails terminally with `kind`.
    pub fn failing_detail(mut self, key: &str, kind: ErrorKind) -> Self {
        self.detail_failures.insert(key.to_string(), kind);
        self
    }

    /// The connection check fails terminally with `kind`.
    pub fn failing_connection(mut self, kind: ErrorKind) -> Self {
        self.connection_failure = Some(kind);
        self
    }

    /// Request shutdown once `count` details have been served.
    pub fn interrupt_after(mut self, count: usize, shutdown: SharedShutdown) -> Self {
        self.interrupt_after = Some((count, shutdown));
        self
    }

    /// Handle on the call log that outlives the source.
    pub fn call_log(&self) -> Arc<Mutex<Vec<Call>>> {
        Arc::clone(&self.calls)
    }

    pub fn connection_checks(&self) -> usize {
        self.connection_checks.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn page_calls(&self) -> Vec<PageCursor> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Page { cursor, .. } => Some(cursor),
                Call::Detail { .. } => None,
            })
            .collect()
    }

    pub fn detail_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Detail { key } => Some(key),
                Call::Page { .. } => None,
            })
            .collect()
    }
}

#[async_trait]
impl IssueSource for FakeSource {
    async fn check_connection(&self) -> Result<(), TerminalError> {
        self.connection_checks.fetch_add(1, Ordering::SeqCst);
        match self.connection_failure {
            Some(kind) => Err(terminal("check_connection", kind)),
            None => Ok(()),
        }
    }

    async fn fetch_page(&self, project: &str, cursor: PageCursor) -> Result<Page, TerminalError> {
        self.calls.lock().unwrap().push(Call::Page {
            project: project.to_string(),
            cursor,
        });

        if let Some(kind) = self.page_failures.get(project) {
            return Err(terminal("fetch_page", *kind));
        }

        let items = self
            .pages
            .get(project)
            .and_then(|pages| pages.get(cursor.page_index as usize))
            .cloned()
            .unwrap_or_default();
        Ok(Page {
            items,
            total_reported: self.total_reported.get(project).copied().unwrap_or(0),
            start_at: cursor.offset,
        })
    }

    async fn fetch_detail(&self, key: &str) -> Result<IssueRecord, TerminalError> {
        let served = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Call::Detail {
                key: key.to_string(),
            });
            calls
                .iter()
                .filter(|call| matches!(call, Call::Detail { .. }))
                .count()
        };

        if let Some(kind) = self.detail_failures.get(key) {
            return Err(terminal("fetch_detail", *kind));
        }

        if let Some((count, shutdown)) = &self.interrupt_after {
            if served >= *count {
                shutdown.request_shutdown();
            }
        }

        let mut record = issue(key);
        record.summary = format!("Detail of {key}");
        Ok(record)
    }
}

/// Minimal search-result record carrying only a key.
pub fn issue(key: &str) -> IssueRecord {
    IssueRecord {
        key: key.to_string(),
        ..IssueRecord::default()
    }
}

pub fn terminal(operation: &str, kind: ErrorKind) -> TerminalError {
    TerminalError::from_failure(operation, FetchFailure::new(kind, "scripted failure"), 1)
}

/// Configuration for `projects` with its checkpoint inside `dir`.
pub fn config(dir: &Path, projects: &[&str], page_size: u32) -> IngestConfig {
    IngestConfig {
        projects: projects.iter().map(|p| p.to_string()).collect(),
        page_size,
        checkpoint_path: dir.join("checkpoint.json"),
        output_path: dir.join("issues.jsonl"),
        ..IngestConfig::default()
    }
}
