//! Storage module for persisting crawl data
//!
//! This module handles everything written to disk by a harvest:
//! - Per-source checkpoints (cursor, dedup set, retry queue)
//! - Append-only raw and transformed record logs

mod checkpoint_store;
mod sink;
mod traits;

pub use checkpoint_store::FileCheckpointStore;
pub use sink::{count_lines, JsonlSink};
pub use traits::{CheckpointStore, StorageError, StorageResult};
