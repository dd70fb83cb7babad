//! Storage traits and error types
//!
//! This module defines the trait interface for checkpoint backends and
//! associated error types.

use crate::state::Checkpoint;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt file {path:?}: {message}")]
    Corrupt { path: PathBuf, message: String },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for checkpoint backends
///
/// Each source's checkpoint is independent; implementations never share state
/// between source identifiers.
pub trait CheckpointStore {
    /// Loads the checkpoint for a source
    ///
    /// Returns a fresh empty checkpoint if the source has never been saved.
    fn load(&self, source_id: &str) -> StorageResult<Checkpoint>;

    /// Overwrites the durable checkpoint for a source
    ///
    /// Implementations must make the write atomic: after a crash the stored
    /// checkpoint is either the previous one or the new one.
    fn save(&mut self, source_id: &str, checkpoint: &Checkpoint) -> StorageResult<()>;

    /// Deletes the checkpoint for a source, if any
    ///
    /// Returns true if something was removed.
    fn clear(&mut self, source_id: &str) -> StorageResult<bool>;
}
