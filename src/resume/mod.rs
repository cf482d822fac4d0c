//! Resume capability for ingestion runs
//!
//! Provides the per-project checkpoint model and a state manager that
//! persists it with atomic file replacement.

pub mod checkpoint;
pub mod state;

pub use checkpoint::{PageCursor, ProjectCheckpoint};
pub use state::{CheckpointMap, ResumeError, StateManager, MAX_STATE_FILE_SIZE};
