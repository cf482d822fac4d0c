//! Checkpoint persistence and management
//!
//! The whole checkpoint map lives in one JSON file keyed by project id.
//! Every write goes to a temporary file in the same directory which is
//! synced and then renamed over the previous file, so a crash at any point
//! leaves either the old or the new file, never a torn one.

use super::checkpoint::{PageCursor, ProjectCheckpoint};
use crate::ingest::failure::ErrorKind;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Maximum accepted checkpoint file size (10 MB); larger files are treated as corrupt.
pub const MAX_STATE_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Suffix appended to a checkpoint file that could not be parsed.
pub const CORRUPT_SUFFIX: &str = "corrupt";

/// Checkpoints of every project, keyed by project id.
pub type CheckpointMap = BTreeMap<String, ProjectCheckpoint>;

/// Durable record of completed work.
#[derive(Debug)]
pub struct StateManager {
    path: PathBuf,
    checkpoints: CheckpointMap,
}

impl StateManager {
    /// Open the checkpoint at `path`, loading whatever is already there.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ResumeError> {
        let path = path.into();
        let checkpoints = read_checkpoints(&path)?;
        info!(
            path = %path.display(),
            projects = checkpoints.len(),
            "Checkpoint loaded"
        );
        Ok(Self { path, checkpoints })
    }

    /// Checkpoint file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the file and merge it into memory.
    ///
    /// Completed keys are unioned, so nothing recorded in memory is lost.
    pub fn load(&mut self) -> Result<&CheckpointMap, ResumeError> {
        let on_disk = read_checkpoints(&self.path)?;
        for (project, checkpoint) in on_disk {
            match self.checkpoints.get_mut(&project) {
                Some(existing) => existing.merge(&checkpoint),
                None => {
                    self.checkpoints.insert(project, checkpoint);
                }
            }
        }
        Ok(&self.checkpoints)
    }

    /// All checkpoints held in memory
    pub fn checkpoints(&self) -> &CheckpointMap {
        &self.checkpoints
    }

    /// Checkpoint of one project, if any work was recorded
    pub fn checkpoint(&self, project: &str) -> Option<&ProjectCheckpoint> {
        self.checkpoints.get(project)
    }

    /// Whether `key` of `project` has already been emitted.
    pub fn is_done(&self, project: &str, key: &str) -> bool {
        self.checkpoints
            .get(project)
            .is_some_and(|checkpoint| checkpoint.is_done(key))
    }

    /// Completed keys recorded for `project`
    pub fn completed_count(&self, project: &str) -> u64 {
        self.checkpoints
            .get(project)
            .map_or(0, ProjectCheckpoint::completed_count)
    }

    /// Where pagination of `project` should start.
    pub fn resume_cursor(&self, project: &str, page_size: u32) -> PageCursor {
        self.checkpoints
            .get(project)
            .map_or_else(PageCursor::start, |checkpoint| checkpoint.resume_cursor(page_size))
    }

    /// Record `key` as emitted and persist before returning.
    ///
    /// `cursor` is the page the key was found on, so a crash mid-page resumes
    /// on that page.
    pub fn mark_done(
        &mut self,
        project: &str,
        key: &str,
        cursor: PageCursor,
    ) -> Result<(), ResumeError> {
        let checkpoint = self.checkpoints.entry(project.to_string()).or_default();
        checkpoint.insert(key);
        checkpoint.set_cursor(cursor);
        checkpoint.touch();
        self.flush()
    }

    /// Persist the cursor of the next page after one was exhausted.
    pub fn advance_cursor(&mut self, project: &str, cursor: PageCursor) -> Result<(), ResumeError> {
        let checkpoint = self.checkpoints.entry(project.to_string()).or_default();
        checkpoint.set_cursor(cursor);
        checkpoint.touch();
        debug!(
            project,
            page_index = cursor.page_index,
            offset = cursor.offset,
            "Advancing checkpoint cursor"
        );
        self.flush()
    }

    /// Write the in-memory state to disk atomically.
    pub fn flush(&self) -> Result<(), ResumeError> {
        write_atomically(&self.path, &self.checkpoints)?;
        debug!(
            path = %self.path.display(),
            projects = self.checkpoints.len(),
            "Checkpoint saved"
        );
        Ok(())
    }

    /// Forget all progress and delete the checkpoint file.
    pub fn reset(&mut self) -> Result<(), ResumeError> {
        self.checkpoints.clear();
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "Checkpoint reset");
                Ok(())
            }
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(()),
            Err(e) => Err(ResumeError::io(&self.path, "remove", e)),
        }
    }
}

/// Read the checkpoint file.
///
/// A missing file is an empty map. A file that cannot be parsed at all is
/// copied aside and treated as empty; a single project entry that cannot be
/// parsed is dropped with a warning while the other projects are kept.
fn read_checkpoints(path: &Path) -> Result<CheckpointMap, ResumeError> {
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == IoErrorKind::NotFound => {
            debug!(path = %path.display(), "No checkpoint file, starting fresh");
            return Ok(CheckpointMap::new());
        }
        Err(e) => return Err(ResumeError::io(path, "stat", e)),
    };

    if metadata.len() > MAX_STATE_FILE_SIZE {
        warn!(
            path = %path.display(),
            size = metadata.len(),
            max = MAX_STATE_FILE_SIZE,
            error_kind = %ErrorKind::StateCorruption,
            "Checkpoint file too large, starting from an empty checkpoint"
        );
        preserve_corrupt(path);
        return Ok(CheckpointMap::new());
    }

    let contents = std::fs::read(path).map_err(|e| ResumeError::io(path, "read", e))?;

    let entries: Map<String, Value> = match serde_json::from_slice(&contents) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                error_kind = %ErrorKind::StateCorruption,
                "Checkpoint file is corrupt, starting from an empty checkpoint"
            );
            preserve_corrupt(path);
            return Ok(CheckpointMap::new());
        }
    };

    let mut checkpoints = CheckpointMap::new();
    for (project, value) in entries {
        match serde_json::from_value::<ProjectCheckpoint>(value) {
            Ok(checkpoint) => {
                checkpoints.insert(project, checkpoint);
            }
            Err(e) => warn!(
                project = %project,
                error = %e,
                error_kind = %ErrorKind::StateCorruption,
                "Project checkpoint is corrupt, resetting it"
            ),
        }
    }
    Ok(checkpoints)
}

fn preserve_corrupt(path: &Path) {
    let mut backup = path.as_os_str().to_owned();
    backup.push(".");
    backup.push(CORRUPT_SUFFIX);
    let backup = PathBuf::from(backup);

    match std::fs::copy(path, &backup) {
        Ok(_) => info!(backup = %backup.display(), "Preserved corrupt checkpoint"),
        Err(e) => warn!(
            backup = %backup.display(),
            error = %e,
            "Failed to preserve corrupt checkpoint"
        ),
    }
}

fn write_atomically(path: &Path, checkpoints: &CheckpointMap) -> Result<(), ResumeError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|e| ResumeError::io(parent, "create directory", e))?;

    let json = serde_json::to_vec_pretty(checkpoints)?;

    let mut temp_file = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| ResumeError::io(parent, "create temp file", e))?;
    temp_file
        .write_all(&json)
        .map_err(|e| ResumeError::io(temp_file.path(), "write", e))?;

    // Flush buffer to OS and sync to disk before the rename
    temp_file
        .flush()
        .map_err(|e| ResumeError::io(temp_file.path(), "flush", e))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| ResumeError::io(temp_file.path(), "sync", e))?;

    temp_file
        .persist(path)
        .map_err(|e| ResumeError::io(path, "persist", e.error))?;

    // Fsync parent directory so the rename itself is durable
    match std::fs::File::open(parent).and_then(|dir| dir.sync_all()) {
        Ok(()) => {}
        Err(e) => debug!(
            dir = %parent.display(),
            error = %e,
            "Directory fsync after checkpoint rename failed"
        ),
    }
    Ok(())
}

/// Errors related to checkpoint persistence
#[derive(Debug, thiserror::Error)]
pub enum ResumeError {
    /// Filesystem operation failed
    #[error("failed to {operation} {path}: {source}")]
    Io {
        /// What was being done
        operation: &'static str,
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ResumeError {
    fn io(path: &Path, operation: &'static str, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }
}
