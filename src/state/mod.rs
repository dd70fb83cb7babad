//! State module for tracking crawl progress
//!
//! This module provides the state kept while harvesting a source.
//!
//! # Components
//!
//! - `CrawlState`: Where a controller is in its query/process/persist loop
//! - `Checkpoint`: Durable per-source progress (cursor, dedup set, retry queue)

mod checkpoint;
mod crawl_state;

// Re-export main types
pub use checkpoint::Checkpoint;
pub use crawl_state::CrawlState;
