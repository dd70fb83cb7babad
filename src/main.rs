//! Issue-Harvest main entry point
//!
//! This is the command-line interface for the Issue-Harvest record harvester.

use anyhow::Context;
use clap::Parser;
use issue_harvest::config::{load_config_with_hash, Config};
use issue_harvest::crawler::{
    run_harvest, select_sources, sources_from_config, write_run_report, ShutdownFlag,
};
use issue_harvest::output::{load_statistics, print_statistics, RunSummary};
use issue_harvest::storage::{CheckpointStore, FileCheckpointStore, JsonlSink};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Issue-Harvest: a resumable issue tracker harvester
///
/// Issue-Harvest pages through each configured source, fetches every record
/// in full, and appends raw and training-ready forms to JSON Lines logs.
/// Progress is checkpointed after every page, so an interrupted run picks up
/// where it stopped.
#[derive(Parser, Debug)]
#[command(name = "issue-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A resumable issue tracker harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Discard checkpoints for the selected sources before harvesting
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    fresh: bool,

    /// Validate config and show what would be harvested without harvesting
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show checkpoint and log statistics and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,

    /// Only harvest this source (repeatable)
    #[arg(long = "source", value_name = "KEY")]
    sources: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    select_sources(&mut config, &cli.sources)?;

    if cli.dry_run {
        handle_dry_run(&config);
        Ok(ExitCode::SUCCESS)
    } else if cli.stats {
        handle_stats(&config)?;
        Ok(ExitCode::SUCCESS)
    } else {
        handle_harvest(config, config_hash, cli.fresh).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("issue_harvest=info,warn"),
            1 => EnvFilter::new("issue_harvest=debug,info"),
            2 => EnvFilter::new("issue_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the plan without touching the network
fn handle_dry_run(config: &Config) {
    println!("=== Issue-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Page size: {}", config.crawler.page_size);
    println!(
        "  Requests per minute: {}",
        match config.crawler.requests_per_minute {
            0 => "unlimited".to_string(),
            rpm => rpm.to_string(),
        }
    );
    println!("  Max attempts: {}", config.crawler.max_attempts);
    println!(
        "  Backoff: {}ms base, {}s cap",
        config.crawler.backoff_base_ms, config.crawler.backoff_max_secs
    );
    println!("  Page retries: {}", config.crawler.page_retries);
    println!(
        "  Retry failed items: {}",
        config.crawler.retry_failed_items
    );

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Records: {}", config.output.output_dir);
    println!("  Checkpoints: {}", config.output.state_dir);
    if let Some(summary) = &config.output.summary_path {
        println!("  Summary: {}", summary);
    }

    let store = FileCheckpointStore::new(&config.output.state_dir);
    let sources = sources_from_config(config);
    println!("\nSources ({}):", sources.len());
    for source in &sources {
        let resume = match store.load(&source.id) {
            Ok(checkpoint) => format!("offset {}", checkpoint.cursor),
            Err(e) => format!("unreadable checkpoint: {}", e),
        };
        println!("  - {} ({})", source.id, resume);
        println!("    query: {}", source.query);
        println!("    list: {}", source.list_url);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows per-source checkpoint and log statistics
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let store = FileCheckpointStore::new(&config.output.state_dir);
    let sink = JsonlSink::new(&config.output.output_dir);
    let keys: Vec<String> = config.sources.iter().map(|s| s.key.clone()).collect();

    let stats = load_statistics(&keys, &store, &sink).context("Failed to load statistics")?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config, config_hash: String, fresh: bool) -> anyhow::Result<ExitCode> {
    if fresh {
        let mut store = FileCheckpointStore::new(&config.output.state_dir);
        for entry in &config.sources {
            if store.clear(&entry.key)? {
                tracing::info!("Cleared checkpoint for {}", entry.key);
            }
        }
    }

    let shutdown = ShutdownFlag::new();
    shutdown.listen_for_signals();

    let mut summary: RunSummary = run_harvest(&config, shutdown)
        .await
        .context("Harvest failed")?;
    summary.config_hash = Some(config_hash);

    match write_run_report(&config, &summary) {
        Ok(Some(path)) => tracing::info!("Run summary written to {}", path.display()),
        Ok(None) => {}
        Err(e) => tracing::warn!("Failed to write run summary: {}", e),
    }

    tracing::info!(
        "Harvest finished: {} records written, {} items failed",
        summary.total_written(),
        summary.total_failed_items()
    );

    let failed = summary.failed_sources();
    if failed.is_empty() {
        if summary.was_interrupted() {
            tracing::info!("Harvest interrupted; rerun to resume");
        }
        Ok(ExitCode::SUCCESS)
    } else {
        for report in failed {
            tracing::error!("Source {} {}", report.source, report.outcome);
        }
        Ok(ExitCode::FAILURE)
    }
}
