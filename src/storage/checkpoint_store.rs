//! File-backed checkpoint store
//!
//! Keeps one pretty-printed JSON document per source under the state
//! directory:
//!
//! ```text
//! {state_dir}/
//! ├── HADOOP.json
//! └── SPARK.json
//! ```

use crate::state::Checkpoint;
use crate::storage::traits::{CheckpointStore, StorageError, StorageResult};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Checkpoint store writing `{source}.json` files
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    root: PathBuf,
}

impl FileCheckpointStore {
    /// Creates a store rooted at the given directory
    ///
    /// The directory is created lazily on first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the checkpoint files
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the checkpoint file for a source
    pub fn path_for(&self, source_id: &str) -> PathBuf {
        self.root.join(format!("{}.json", source_id))
    }

    /// Writes bytes atomically (write to temp, sync, then rename)
    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> StorageResult<()> {
        fs::create_dir_all(&self.root)?;

        let tmp = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }

        fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&self, source_id: &str) -> StorageResult<Checkpoint> {
        let path = self.path_for(source_id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No checkpoint for {} at {:?}, starting fresh", source_id, path);
                return Ok(Checkpoint::new());
            }
            Err(e) => return Err(StorageError::Io(e)),
        };

        serde_json::from_slice(&bytes).map_err(|e| StorageError::Corrupt {
            path,
            message: e.to_string(),
        })
    }

    fn save(&mut self, source_id: &str, checkpoint: &Checkpoint) -> StorageResult<()> {
        let path = self.path_for(source_id);
        let bytes = serde_json::to_vec_pretty(checkpoint)?;
        self.write_atomic(&path, &bytes)?;
        tracing::trace!(
            "Saved checkpoint for {} (cursor={}, seen={})",
            source_id,
            checkpoint.cursor,
            checkpoint.seen.len()
        );
        Ok(())
    }

    fn clear(&mut self, source_id: &str) -> StorageResult<bool> {
        match fs::remove_file(self.path_for(source_id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}
