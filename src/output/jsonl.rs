//! JSON-lines record sink
//!
//! Appends one JSON object per line. Each emit is pushed to the OS
//! immediately; the file is synced to disk every `batch_size` records and on
//! [`RecordSink::flush`].

use super::{OutputError, OutputResult, RecordSink};
use crate::IssueRecord;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Appending JSON-lines writer
pub struct JsonlSink {
    path: PathBuf,
    writer: BufWriter<File>,
    batch_size: usize,
    records_written: u64,
    unsynced: usize,
}

impl JsonlSink {
    /// Open `path` for appending, creating it and its parent directory.
    ///
    /// # Arguments
    /// * `path` - Output file
    /// * `batch_size` - Records between disk syncs (minimum 1)
    pub fn open<P: AsRef<Path>>(path: P, batch_size: usize) -> OutputResult<Self> {
        Self::open_with(path.as_ref(), batch_size, false)
    }

    /// Create `path`, discarding any previous contents.
    pub fn create<P: AsRef<Path>>(path: P, batch_size: usize) -> OutputResult<Self> {
        Self::open_with(path.as_ref(), batch_size, true)
    }

    fn open_with(path: &Path, batch_size: usize, truncate: bool) -> OutputResult<Self> {
        let path = path.to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                OutputError::IoError(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }

        let mut options = OpenOptions::new();
        options.create(true);
        if truncate {
            options.write(true).truncate(true);
        } else {
            options.append(true);
        }
        let file = options
            .open(&path)
            .map_err(|e| OutputError::IoError(format!("Failed to open {}: {e}", path.display())))?;

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            batch_size: batch_size.max(1),
            records_written: 0,
            unsynced: 0,
        })
    }

    /// Records written by this sink
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Output file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sync(&mut self) -> OutputResult<()> {
        self.writer
            .flush()
            .map_err(|e| OutputError::FlushError(format!("Failed to flush: {e}")))?;
        self.writer
            .get_ref()
            .sync_data()
            .map_err(|e| OutputError::IoError(format!("Failed to sync file: {e}")))?;
        debug!(
            path = %self.path.display(),
            records = self.unsynced,
            "Synced output batch"
        );
        self.unsynced = 0;
        Ok(())
    }
}

impl RecordSink for JsonlSink {
    fn emit(&mut self, record: &IssueRecord) -> OutputResult<()> {
        serde_json::to_writer(&mut self.writer, record)
            .map_err(|e| OutputError::SerializationError(e.to_string()))?;
        self.writer
            .write_all(b"\n")
            .map_err(|e| OutputError::IoError(format!("Failed to write record: {e}")))?;
        self.writer
            .flush()
            .map_err(|e| OutputError::FlushError(format!("Failed to flush: {e}")))?;

        self.records_written += 1;
        self.unsynced += 1;
        if self.unsynced >= self.batch_size {
            self.sync()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> OutputResult<()> {
        self.sync()
    }
}
