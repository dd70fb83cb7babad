//! Markdown run report
//!
//! This module generates a human-readable markdown summary of a harvest
//! run: per-source outcomes, progress, and items awaiting a retry.

use crate::output::report::RunSummary;
use std::fs;
use std::path::Path;

/// Most failed identifiers listed per source
const MAX_LISTED_FAILURES: usize = 20;

/// Writes the markdown summary, creating parent directories as needed
pub fn generate_markdown_summary(summary: &RunSummary, output_path: &Path) -> std::io::Result<()> {
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output_path, format_markdown_summary(summary))
}

/// Formats a run summary as markdown
pub fn format_markdown_summary(summary: &RunSummary) -> String {
    let mut md = String::new();

    md.push_str("# Issue Harvest Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!(
        "- **Started**: {}\n",
        summary.started_at.to_rfc3339()
    ));
    if let Some(finished) = summary.finished_at {
        md.push_str(&format!("- **Finished**: {}\n", finished.to_rfc3339()));
    }
    if let Some(duration) = summary.duration_seconds() {
        md.push_str(&format!(
            "- **Duration**: {} seconds ({:.2} minutes)\n",
            duration,
            duration as f64 / 60.0
        ));
    }
    if let Some(hash) = &summary.config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    md.push_str(&format!(
        "- **Records Written**: {}\n",
        summary.total_written()
    ));
    md.push_str(&format!(
        "- **Failed Items**: {}\n\n",
        summary.total_failed_items()
    ));

    // Source breakdown
    md.push_str("## Sources\n\n");
    md.push_str(
        "| Source | Outcome | Offset | Total | Progress | Pages | Written | Skipped | Failed |\n",
    );
    md.push_str(
        "|--------|---------|--------|-------|----------|-------|---------|---------|--------|\n",
    );
    for source in &summary.sources {
        let total = source
            .total
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".to_string());
        let progress = source
            .progress_percent()
            .map(|p| format!("{:.1}%", p))
            .unwrap_or_else(|| "-".to_string());
        md.push_str(&format!(
            "| {} | {} | {} → {} | {} | {} | {} | {} | {} | {} |\n",
            source.source,
            source.outcome,
            source.start_cursor,
            source.final_cursor,
            total,
            progress,
            source.pages,
            source.written,
            source.skipped_seen + source.skipped_invalid,
            source.failed_items.len()
        ));
    }
    md.push('\n');

    let with_failures: Vec<_> = summary
        .sources
        .iter()
        .filter(|s| !s.failed_items.is_empty())
        .collect();
    if !with_failures.is_empty() {
        md.push_str("## Failed Items\n\n");
        for source in with_failures {
            md.push_str(&format!("### {}\n\n", source.source));
            for id in source.failed_items.iter().take(MAX_LISTED_FAILURES) {
                md.push_str(&format!("- {}\n", id));
            }
            if source.failed_items.len() > MAX_LISTED_FAILURES {
                md.push_str(&format!(
                    "- ... and {} more\n",
                    source.failed_items.len() - MAX_LISTED_FAILURES
                ));
            }
            md.push('\n');
        }
    }

    md
}
