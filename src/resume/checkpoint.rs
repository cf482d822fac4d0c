//! Checkpoint types for resume capability
//!
//! A [`ProjectCheckpoint`] records which issue keys of one project have been
//! emitted and where pagination should pick up. The completed set only grows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Pagination position within a project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PageCursor {
    /// Zero-based page number
    pub page_index: u64,
    /// Item offset sent as `startAt`
    pub offset: u64,
}

impl PageCursor {
    /// Cursor at the start of a project.
    pub fn start() -> Self {
        Self::default()
    }

    /// Cursor at `page_index`, assuming full pages of `page_size` items.
    pub fn at_page(page_index: u64, page_size: u32) -> Self {
        Self {
            page_index,
            offset: page_index.saturating_mul(u64::from(page_size)),
        }
    }

    /// Cursor after a page that returned `items` entries.
    ///
    /// The offset follows what the server actually returned, which keeps the
    /// walk correct when the server caps `maxResults` below the page size.
    pub fn advance(self, items: usize) -> Self {
        Self {
            page_index: self.page_index + 1,
            offset: self.offset + items as u64,
        }
    }
}

/// Durable progress of one project.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "CheckpointRecord")]
pub struct ProjectCheckpoint {
    completed_issue_keys: Vec<String>,
    last_page_index: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_offset: Option<u64>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    index: HashSet<String>,
}

/// On-disk shape, before the lookup index is rebuilt.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckpointRecord {
    #[serde(default)]
    completed_issue_keys: Vec<String>,
    #[serde(default)]
    last_page_index: u64,
    #[serde(default)]
    last_offset: Option<u64>,
    #[serde(default = "Utc::now")]
    updated_at: DateTime<Utc>,
}

impl From<CheckpointRecord> for ProjectCheckpoint {
    fn from(record: CheckpointRecord) -> Self {
        let mut checkpoint = Self {
            completed_issue_keys: Vec::with_capacity(record.completed_issue_keys.len()),
            last_page_index: record.last_page_index,
            last_offset: record.last_offset,
            updated_at: record.updated_at,
            index: HashSet::with_capacity(record.completed_issue_keys.len()),
        };
        for key in record.completed_issue_keys {
            checkpoint.insert(key);
        }
        checkpoint
    }
}

impl Default for ProjectCheckpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectCheckpoint {
    /// Empty checkpoint positioned at the first page.
    pub fn new() -> Self {
        Self {
            completed_issue_keys: Vec::new(),
            last_page_index: 0,
            last_offset: None,
            updated_at: Utc::now(),
            index: HashSet::new(),
        }
    }

    /// Whether `key` has already been emitted.
    pub fn is_done(&self, key: &str) -> bool {
        self.index.contains(key)
    }

    /// Record `key` as emitted. Returns `false` if it already was.
    pub fn insert(&mut self, key: impl Into<String>) -> bool {
        let key = key.into();
        if self.index.contains(&key) {
            return false;
        }
        self.index.insert(key.clone());
        self.completed_issue_keys.push(key);
        true
    }

    /// Completed keys in completion order
    pub fn completed_keys(&self) -> &[String] {
        &self.completed_issue_keys
    }

    /// Number of completed keys
    pub fn completed_count(&self) -> u64 {
        self.completed_issue_keys.len() as u64
    }

    /// Last persisted page index
    pub fn last_page_index(&self) -> u64 {
        self.last_page_index
    }

    /// Last persisted offset, if one was recorded
    pub fn last_offset(&self) -> Option<u64> {
        self.last_offset
    }

    /// Time of the last mutation
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Where a new run should start.
    ///
    /// Files written without an offset fall back to full pages of
    /// `page_size`.
    pub fn resume_cursor(&self, page_size: u32) -> PageCursor {
        match self.last_offset {
            Some(offset) => PageCursor {
                page_index: self.last_page_index,
                offset,
            },
            None => PageCursor::at_page(self.last_page_index, page_size),
        }
    }

    /// Move the stored cursor forward. Older cursors are ignored.
    pub fn set_cursor(&mut self, cursor: PageCursor) {
        let current = (self.last_page_index, self.last_offset.unwrap_or(0));
        if (cursor.page_index, cursor.offset) >= current {
            self.last_page_index = cursor.page_index;
            self.last_offset = Some(cursor.offset);
        }
    }

    /// Stamp the checkpoint as modified now.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Fold another view of the same project into this one.
    ///
    /// Keys are unioned (this checkpoint's order first), the furthest cursor
    /// wins and the newest timestamp is kept.
    pub fn merge(&mut self, other: &ProjectCheckpoint) {
        for key in &other.completed_issue_keys {
            self.insert(key.as_str());
        }
        if let Some(offset) = other.last_offset {
            self.set_cursor(PageCursor {
                page_index: other.last_page_index,
                offset,
            });
        } else if other.last_page_index > self.last_page_index {
            self.last_page_index = other.last_page_index;
            self.last_offset = None;
        }
        self.updated_at = self.updated_at.max(other.updated_at);
    }
}
