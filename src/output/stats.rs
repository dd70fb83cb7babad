//! Statistics generation from checkpoints and record logs
//!
//! This module provides functionality for extracting and displaying
//! per-source harvest statistics without touching the network.

use crate::storage::{count_lines, CheckpointStore, JsonlSink, StorageResult};
use chrono::{DateTime, Utc};

/// Harvest statistics for one source
#[derive(Debug, Clone, PartialEq)]
pub struct SourceStatistics {
    pub source: String,

    /// Offset the next run resumes from
    pub cursor: u64,

    /// Identifiers already processed
    pub seen: usize,

    /// Identifiers waiting in the retry queue
    pub failed: usize,

    pub updated_at: Option<DateTime<Utc>>,

    /// Lines in the raw log
    pub raw_lines: u64,

    /// Lines in the transformed log
    pub transformed_lines: u64,
}

impl SourceStatistics {
    /// True when the two logs have diverged in length
    ///
    /// Expected only after a crash in the middle of a page append.
    pub fn logs_diverged(&self) -> bool {
        self.raw_lines != self.transformed_lines
    }

    /// Lines beyond the dedup set, i.e. duplicates left by a crash
    pub fn duplicate_lines(&self) -> u64 {
        self.raw_lines.saturating_sub(self.seen as u64)
    }
}

/// Loads statistics for the given sources
pub fn load_statistics<S: CheckpointStore>(
    sources: &[String],
    store: &S,
    sink: &JsonlSink,
) -> StorageResult<Vec<SourceStatistics>> {
    sources
        .iter()
        .map(|source| {
            let checkpoint = store.load(source)?;
            Ok(SourceStatistics {
                source: source.clone(),
                cursor: checkpoint.cursor,
                seen: checkpoint.seen.len(),
                failed: checkpoint.failed.len(),
                updated_at: checkpoint.updated_at,
                raw_lines: count_lines(&sink.raw_path(source))?,
                transformed_lines: count_lines(&sink.transformed_path(source))?,
            })
        })
        .collect()
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &[SourceStatistics]) {
    println!("=== Harvest Statistics ===\n");

    for s in stats {
        println!("{}:", s.source);
        println!("  Resume offset: {}", s.cursor);
        println!("  Records seen: {}", s.seen);
        println!("  Pending retries: {}", s.failed);
        match s.updated_at {
            Some(at) => println!("  Last checkpoint: {}", at.to_rfc3339()),
            None => println!("  Last checkpoint: never"),
        }
        println!("  Raw log lines: {}", s.raw_lines);
        println!("  Transformed log lines: {}", s.transformed_lines);
        if s.logs_diverged() {
            println!("  WARNING: raw and transformed logs differ in length");
        }
        if s.duplicate_lines() > 0 {
            println!(
                "  Note: {} duplicate lines from an interrupted page",
                s.duplicate_lines()
            );
        }
        println!();
    }

    let seen: usize = stats.iter().map(|s| s.seen).sum();
    let failed: usize = stats.iter().map(|s| s.failed).sum();
    println!(
        "Total: {} records across {} sources, {} pending retries",
        seen,
        stats.len(),
        failed
    );
}
