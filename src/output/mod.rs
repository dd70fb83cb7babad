//! Output module for reporting harvest results
//!
//! This module handles:
//! - Per-source and per-run reports
//! - Markdown run summaries
//! - Checkpoint and log statistics

mod markdown;
mod report;
pub mod stats;

pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use report::{RunSummary, SourceOutcome, SourceReport};
pub use stats::{load_statistics, print_statistics, SourceStatistics};
