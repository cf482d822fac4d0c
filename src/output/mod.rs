//! Record sinks
//!
//! The orchestrator hands each completed [`IssueRecord`] to a [`RecordSink`]
//! before recording it in the checkpoint. A sink may buffer; `flush` must
//! make everything emitted so far durable.

use crate::IssueRecord;

pub mod jsonl;

/// Output errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Buffer flush error
    #[error("flush error: {0}")]
    FlushError(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Destination for fetched records.
pub trait RecordSink: Send {
    /// Accept one record.
    fn emit(&mut self, record: &IssueRecord) -> OutputResult<()>;

    /// Make every emitted record durable.
    fn flush(&mut self) -> OutputResult<()>;
}

/// Sink collecting records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Vec<IssueRecord>,
    flushes: usize,
}

impl MemorySink {
    /// Empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Records emitted so far, in order
    pub fn records(&self) -> &[IssueRecord] {
        &self.records
    }

    /// Keys emitted so far, in order
    pub fn keys(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.key.as_str()).collect()
    }

    /// Number of `flush` calls
    pub fn flush_count(&self) -> usize {
        self.flushes
    }
}

impl RecordSink for MemorySink {
    fn emit(&mut self, record: &IssueRecord) -> OutputResult<()> {
        self.records.push(record.clone());
        Ok(())
    }

    fn flush(&mut self) -> OutputResult<()> {
        self.flushes += 1;
        Ok(())
    }
}
