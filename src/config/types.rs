use serde::Deserialize;

/// Main configuration structure for Issue-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub remote: RemoteConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceEntry>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Number of summaries requested per list page
    #[serde(default = "defaults::page_size")]
    pub page_size: u32,

    /// Outbound request budget; 0 disables throttling
    #[serde(default = "defaults::requests_per_minute")]
    pub requests_per_minute: u32,

    /// Attempt budget for transient failures of a single request
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// First exponential backoff step (milliseconds)
    #[serde(default = "defaults::backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound on a single backoff (seconds)
    #[serde(default = "defaults::backoff_max_secs")]
    pub backoff_max_secs: u64,

    /// Wait applied to a 429 without a usable Retry-After header (seconds)
    #[serde(default = "defaults::rate_limit_fallback_secs")]
    pub rate_limit_fallback_secs: u64,

    /// How many times the controller re-issues a failed list query
    #[serde(default = "defaults::page_retries")]
    pub page_retries: u32,

    /// Delay between re-issued list queries (seconds)
    #[serde(default = "defaults::page_retry_delay_secs")]
    pub page_retry_delay_secs: u64,

    /// Per-request timeout (seconds)
    #[serde(default = "defaults::request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Persist failed detail fetches and retry them on the next run
    #[serde(default = "defaults::retry_failed_items")]
    pub retry_failed_items: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            page_size: defaults::page_size(),
            requests_per_minute: defaults::requests_per_minute(),
            max_attempts: defaults::max_attempts(),
            backoff_base_ms: defaults::backoff_base_ms(),
            backoff_max_secs: defaults::backoff_max_secs(),
            rate_limit_fallback_secs: defaults::rate_limit_fallback_secs(),
            page_retries: defaults::page_retries(),
            page_retry_delay_secs: defaults::page_retry_delay_secs(),
            request_timeout_secs: defaults::request_timeout_secs(),
            retry_failed_items: defaults::retry_failed_items(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Shape of the remote API
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RemoteConfig {
    /// Base URL of the remote instance, without trailing slash
    pub base_url: String,

    /// Path of the paged list endpoint
    #[serde(default = "defaults::search_path")]
    pub search_path: String,

    /// Path of the detail endpoint; `{key}` is replaced by the identifier
    #[serde(default = "defaults::detail_path")]
    pub detail_path: String,

    /// Query-string name carrying the filter/sort expression
    #[serde(default = "defaults::query_param")]
    pub query_param: String,

    /// Query-string name carrying the page offset
    #[serde(default = "defaults::offset_param")]
    pub offset_param: String,

    /// Query-string name carrying the page size
    #[serde(default = "defaults::page_size_param")]
    pub page_size_param: String,

    /// Query used for sources without an explicit one; `{key}` is the source key
    #[serde(default = "defaults::query_template")]
    pub query_template: String,

    /// Optional field projection sent with list and detail requests
    #[serde(default)]
    pub fields: Option<String>,

    /// Summary field holding the record identifier
    #[serde(default = "defaults::id_field")]
    pub id_field: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Directory receiving the raw and transformed logs
    pub output_dir: String,

    /// Directory receiving one checkpoint file per source
    pub state_dir: String,

    /// Path of the markdown run report
    #[serde(default)]
    pub summary_path: Option<String>,
}

/// One configured source
#[derive(Debug, Clone, Deserialize)]
pub struct SourceEntry {
    /// Source identifier (e.g. project key); names checkpoint and log files
    pub key: String,

    /// Explicit filter/sort expression; must yield a stable total order
    #[serde(default)]
    pub query: Option<String>,
}

mod defaults {
    pub fn page_size() -> u32 {
        50
    }
    pub fn requests_per_minute() -> u32 {
        60
    }
    pub fn max_attempts() -> u32 {
        5
    }
    pub fn backoff_base_ms() -> u64 {
        1000
    }
    pub fn backoff_max_secs() -> u64 {
        60
    }
    pub fn rate_limit_fallback_secs() -> u64 {
        60
    }
    pub fn page_retries() -> u32 {
        3
    }
    pub fn page_retry_delay_secs() -> u64 {
        10
    }
    pub fn request_timeout_secs() -> u64 {
        30
    }
    pub fn retry_failed_items() -> bool {
        true
    }

    pub fn search_path() -> String {
        "/rest/api/2/search".into()
    }
    pub fn detail_path() -> String {
        "/rest/api/2/issue/{key}".into()
    }
    pub fn query_param() -> String {
        "jql".into()
    }
    pub fn offset_param() -> String {
        "startAt".into()
    }
    pub fn page_size_param() -> String {
        "maxResults".into()
    }
    pub fn query_template() -> String {
        "project = {key} ORDER BY created ASC".into()
    }
    pub fn id_field() -> String {
        "key".into()
    }
}
