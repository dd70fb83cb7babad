//! Crawler module for resumable paginated harvesting
//!
//! This module contains the core harvesting logic, including:
//! - Request pacing and the injectable clock behind it
//! - The resilient HTTP transport with retry and rate-limit handling
//! - The per-source crawl controller
//! - Run orchestration across sources and clean shutdown

mod clock;
mod controller;
mod orchestrator;
mod shutdown;
mod throttle;
mod transport;

pub use clock::{Clock, ManualClock, TokioClock};
pub use controller::{CrawlController, CrawlSettings};
pub use orchestrator::{
    run_harvest, run_sources, select_sources, sources_from_config, write_run_report,
};
pub use shutdown::ShutdownFlag;
pub use throttle::Throttler;
pub use transport::{build_http_client, parse_retry_after, RetryPolicy, Transport};
