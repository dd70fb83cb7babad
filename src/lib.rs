//! Issue-Harvest: a resumable harvester for paginated issue trackers
//!
//! This crate pages through a remote list endpoint, fetches the full detail of
//! every record, converts it into a training-ready shape, and appends both the
//! raw and the converted records to durable logs. Progress is checkpointed per
//! source after every page so an interrupted run resumes where it stopped.

pub mod config;
pub mod crawler;
pub mod output;
pub mod record;
pub mod source;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Issue-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition {
        from: state::CrawlState,
        to: state::CrawlState,
    },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors surfaced by the resilient transport
///
/// Rate limiting is not represented here: a 429 is always waited out inside
/// the transport and never reaches the caller.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Retryable failure that persisted for the whole attempt budget
    #[error("Transient failure for {url} after {attempts} attempts: {message}")]
    Transient {
        url: String,
        attempts: u32,
        status: Option<u16>,
        message: String,
    },

    /// Non-retryable 4xx response
    #[error("Client error {status} for {url}: {body}")]
    Client { url: String, status: u16, body: String },

    /// Response that could not be understood
    #[error("Protocol error for {url}: {message}")]
    Protocol { url: String, message: String },
}

impl TransportError {
    /// Returns true if re-issuing the same request later may succeed
    ///
    /// Malformed bodies count as retryable because a list endpoint that
    /// returns garbage once is usually fine on the next request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::Protocol { .. })
    }

    /// HTTP status attached to the failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transient { status, .. } => *status,
            Self::Client { status, .. } => Some(*status),
            Self::Protocol { .. } => None,
        }
    }
}

/// Result type alias for Issue-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for transport operations
pub type TransportResult<T> = std::result::Result<T, TransportError>;

// Re-export commonly used types
pub use config::Config;
pub use record::{transform, NormalizedRecord, Page, RawRecord};
pub use source::Source;
pub use state::{Checkpoint, CrawlState};
