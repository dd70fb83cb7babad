//! Per-source and per-run harvest reports

use chrono::{DateTime, Utc};
use std::fmt;

/// How a source's harvest ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    /// Reached the end of the result set
    Completed,
    /// Stopped at a page boundary because shutdown was requested
    Interrupted,
    /// Aborted; the checkpoint holds the last durable progress
    Failed(String),
}

impl fmt::Display for SourceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Interrupted => write!(f, "interrupted"),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// What one controller run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub source: String,
    pub outcome: SourceOutcome,
    pub start_cursor: u64,
    pub final_cursor: u64,
    /// Last server-reported total, if any page was fetched
    pub total: Option<u64>,
    pub pages: u64,
    /// Records appended to both logs
    pub written: u64,
    /// Summaries skipped because their identifier was already seen
    pub skipped_seen: u64,
    /// Summaries without a usable identifier
    pub skipped_invalid: u64,
    /// Identifiers whose detail fetch failed during this run
    pub failed_items: Vec<String>,
    /// Previously failed identifiers recovered at the start of this run
    pub recovered: u64,
}

impl SourceReport {
    pub fn new(source: impl Into<String>, start_cursor: u64) -> Self {
        Self {
            source: source.into(),
            outcome: SourceOutcome::Completed,
            start_cursor,
            final_cursor: start_cursor,
            total: None,
            pages: 0,
            written: 0,
            skipped_seen: 0,
            skipped_invalid: 0,
            failed_items: Vec::new(),
            recovered: 0,
        }
    }

    /// Report for a source that failed before its controller could run
    pub fn failed(source: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut report = Self::new(source, 0);
        report.outcome = SourceOutcome::Failed(reason.into());
        report
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, SourceOutcome::Failed(_))
    }

    /// Progress through the result set as a percentage
    pub fn progress_percent(&self) -> Option<f64> {
        match self.total {
            Some(0) => Some(100.0),
            Some(total) => Some((self.final_cursor.min(total) as f64 / total as f64) * 100.0),
            None => None,
        }
    }
}

/// Outcome of a whole run across sources
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub config_hash: Option<String>,
    pub sources: Vec<SourceReport>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            config_hash: None,
            sources: Vec::new(),
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn duration_seconds(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_seconds())
    }

    pub fn total_written(&self) -> u64 {
        self.sources.iter().map(|s| s.written).sum()
    }

    pub fn total_failed_items(&self) -> usize {
        self.sources.iter().map(|s| s.failed_items.len()).sum()
    }

    pub fn failed_sources(&self) -> Vec<&SourceReport> {
        self.sources.iter().filter(|s| s.is_failed()).collect()
    }

    pub fn was_interrupted(&self) -> bool {
        self.sources
            .iter()
            .any(|s| s.outcome == SourceOutcome::Interrupted)
    }
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new()
    }
}
