//! Append-only JSON Lines sink for raw and transformed records

use crate::storage::traits::StorageResult;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writes records as newline-delimited JSON under an output directory
///
/// Lines are never rewritten or reordered. A process killed mid-append may
/// leave a partial last line; readers are expected to skip it.
#[derive(Debug, Clone)]
pub struct JsonlSink {
    root: PathBuf,
}

impl JsonlSink {
    /// Creates a sink rooted at the given directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the raw log for a source
    pub fn raw_path(&self, source_id: &str) -> PathBuf {
        self.root.join(format!("{}_raw.jsonl", source_id))
    }

    /// Path of the transformed log for a source
    pub fn transformed_path(&self, source_id: &str) -> PathBuf {
        self.root.join(format!("{}_transformed.jsonl", source_id))
    }

    /// Appends one line per record, creating the file if needed
    pub fn append<T: Serialize>(&self, path: &Path, records: &[T]) -> StorageResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = BufWriter::new(file);
        for record in records {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        writer.get_ref().sync_data()?;

        tracing::trace!("Appended {} records to {:?}", records.len(), path);
        Ok(())
    }
}

/// Counts complete lines in a log; a missing file counts as empty
pub fn count_lines(path: &Path) -> StorageResult<u64> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut count = 0;
    for line in BufReader::new(file).lines() {
        if !line?.trim().is_empty() {
            count += 1;
        }
    }
    Ok(count)
}
