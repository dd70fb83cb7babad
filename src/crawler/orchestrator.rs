//! Run orchestration across sources
//!
//! Builds the shared transport and storage from configuration, then hands
//! each source to its own controller, one after the other.

use crate::config::Config;
use crate::crawler::clock::TokioClock;
use crate::crawler::controller::{CrawlController, CrawlSettings};
use crate::crawler::shutdown::ShutdownFlag;
use crate::crawler::transport::Transport;
use crate::output::{generate_markdown_summary, RunSummary, SourceReport};
use crate::source::Source;
use crate::storage::{CheckpointStore, FileCheckpointStore, JsonlSink};
use crate::{ConfigError, ConfigResult, Result};
use std::path::PathBuf;
use std::sync::Arc;

/// Sources described by the configuration, in file order
pub fn sources_from_config(config: &Config) -> Vec<Source> {
    config
        .sources
        .iter()
        .map(|entry| Source::from_config(entry, &config.remote))
        .collect()
}

/// Restricts the configuration to the named sources
///
/// An empty list keeps every source. Naming a source that is not configured
/// is an error.
pub fn select_sources(config: &mut Config, only: &[String]) -> ConfigResult<()> {
    if only.is_empty() {
        return Ok(());
    }

    for key in only {
        if !config.sources.iter().any(|s| &s.key == key) {
            return Err(ConfigError::Validation(format!(
                "Unknown source '{}'",
                key
            )));
        }
    }

    config.sources.retain(|s| only.contains(&s.key));
    Ok(())
}

/// Harvests every configured source with production transport and storage
pub async fn run_harvest(config: &Config, shutdown: ShutdownFlag) -> Result<RunSummary> {
    let mut transport =
        Transport::from_config(&config.crawler, &config.user_agent, Arc::new(TokioClock))?;
    let mut store = FileCheckpointStore::new(&config.output.state_dir);
    let sink = JsonlSink::new(&config.output.output_dir);
    let sources = sources_from_config(config);

    tracing::info!(
        "Harvesting {} sources into {}",
        sources.len(),
        config.output.output_dir
    );

    Ok(run_sources(
        &sources,
        CrawlSettings::from_config(&config.crawler),
        &mut transport,
        &mut store,
        &sink,
        &shutdown,
    )
    .await)
}

/// Runs sources sequentially over one shared transport
///
/// A source that fails is recorded in the summary and the next one
/// proceeds. Once shutdown is requested no further source is started.
pub async fn run_sources<S: CheckpointStore>(
    sources: &[Source],
    settings: CrawlSettings,
    transport: &mut Transport,
    store: &mut S,
    sink: &JsonlSink,
    shutdown: &ShutdownFlag,
) -> RunSummary {
    let mut summary = RunSummary::new();

    for source in sources {
        if shutdown.is_triggered() {
            tracing::info!("Shutdown requested, not starting {}", source.id);
            break;
        }

        let result = match CrawlController::new(
            source,
            settings,
            transport,
            store,
            sink,
            shutdown.clone(),
        ) {
            Ok(controller) => controller.run().await,
            Err(e) => Err(e),
        };

        let report = match result {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("Source {} failed: {}", source.id, e);
                SourceReport::failed(source.id.clone(), e.to_string())
            }
        };
        summary.sources.push(report);
    }

    summary.finish();
    summary
}

/// Writes the markdown run report if a path is configured
///
/// Returns the path written.
pub fn write_run_report(config: &Config, summary: &RunSummary) -> std::io::Result<Option<PathBuf>> {
    let Some(path) = &config.output.summary_path else {
        return Ok(None);
    };
    let path = PathBuf::from(path);
    generate_markdown_summary(summary, &path)?;
    Ok(Some(path))
}
