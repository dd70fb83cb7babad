//! Resilient HTTP transport
//!
//! This module handles every request a harvest makes, including:
//! - Building the HTTP client with the configured user agent
//! - Pacing through the shared `Throttler`
//! - Waiting out rate limits (HTTP 429)
//! - Exponential backoff on transient failures
//! - Error classification into `TransportError`

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::crawler::clock::Clock;
use crate::crawler::throttle::Throttler;
use crate::{TransportError, TransportResult};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{redirect::Policy, Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Longest response body kept in a `Client` error
const MAX_ERROR_BODY: usize = 512;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Per-request timeout
///
/// # Example
///
/// ```no_run
/// use issue_harvest::config::UserAgentConfig;
/// use issue_harvest::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "IssueHarvest".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Retry and backoff parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts allowed for transient failures, first try included
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    /// Wait applied to a 429 without a usable Retry-After header
    pub rate_limit_fallback: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            backoff_max: Duration::from_secs(config.backoff_max_secs),
            rate_limit_fallback: Duration::from_secs(config.rate_limit_fallback_secs),
        }
    }

    /// Delay after the given failed attempt (1-based): `base * 2^(attempt-1)`, capped
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.backoff_base.saturating_mul(factor).min(self.backoff_max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&CrawlerConfig::default())
    }
}

/// Reads a Retry-After header given in whole seconds
///
/// HTTP-date values and anything else that is not a plain non-negative
/// integer are rejected.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse::<u64>().ok().map(Duration::from_secs)
}

/// Single logical path for all outbound requests
///
/// Owns the last-request timestamp, so every request of a run is paced
/// against the previous one regardless of which source issued it.
#[derive(Debug)]
pub struct Transport {
    client: Client,
    throttler: Throttler,
    policy: RetryPolicy,
    last_request: Option<Instant>,
}

impl Transport {
    pub fn new(client: Client, throttler: Throttler, policy: RetryPolicy) -> Self {
        Self {
            client,
            throttler,
            policy,
            last_request: None,
        }
    }

    /// Builds client, throttler and policy from configuration
    pub fn from_config(
        crawler: &CrawlerConfig,
        user_agent: &UserAgentConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, reqwest::Error> {
        let client =
            build_http_client(user_agent, Duration::from_secs(crawler.request_timeout_secs))?;
        let throttler = Throttler::from_requests_per_minute(crawler.requests_per_minute, clock);
        Ok(Self::new(client, throttler, RetryPolicy::from_config(crawler)))
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        self.throttler.clock()
    }

    /// GET returning the decoded JSON body
    pub async fn get(&mut self, url: &str, params: &[(String, String)]) -> TransportResult<Value> {
        self.request(Method::GET, url, params).await
    }

    /// GET decoded into a typed value
    pub async fn get_json<T: DeserializeOwned>(
        &mut self,
        url: &str,
        params: &[(String, String)],
    ) -> TransportResult<T> {
        let value = self.get(url, params).await?;
        serde_json::from_value(value).map_err(|e| TransportError::Protocol {
            url: url.to_string(),
            message: format!("Unexpected response shape: {}", e),
        })
    }

    /// Performs a request with pacing, rate-limit waits and retries
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 2xx, JSON body | Return body |
    /// | HTTP 2xx, bad body | `Protocol` |
    /// | HTTP 429 | Wait Retry-After (or fallback), retry; no attempt used |
    /// | HTTP 5xx | Backoff, retry up to `max_attempts` |
    /// | Connect/timeout/read failure | Backoff, retry up to `max_attempts` |
    /// | Other HTTP 4xx | `Client` immediately |
    /// | Anything else | `Protocol` |
    pub async fn request(
        &mut self,
        method: Method,
        url: &str,
        params: &[(String, String)],
    ) -> TransportResult<Value> {
        let mut failures: u32 = 0;

        loop {
            self.last_request = Some(self.throttler.wait_turn(self.last_request).await);

            let response = match self
                .client
                .request(method.clone(), url)
                .query(params)
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    failures += 1;
                    self.retry_or_fail(url, failures, None, describe(&e)).await?;
                    continue;
                }
            };

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let wait = match parse_retry_after(response.headers()) {
                    Some(wait) => wait,
                    None => {
                        tracing::debug!("No usable Retry-After from {}, using fallback", url);
                        self.policy.rate_limit_fallback
                    }
                };
                tracing::warn!("Rate limited by {}; waiting {:?}", url, wait);
                self.clock().sleep(wait).await;
                continue;
            }

            if status.is_server_error() {
                failures += 1;
                self.retry_or_fail(url, failures, Some(status), format!("HTTP {}", status))
                    .await?;
                continue;
            }

            if status.is_client_error() {
                let mut body = response.text().await.unwrap_or_default();
                truncate_on_char_boundary(&mut body, MAX_ERROR_BODY);
                return Err(TransportError::Client {
                    url: url.to_string(),
                    status: status.as_u16(),
                    body,
                });
            }

            if !status.is_success() {
                return Err(TransportError::Protocol {
                    url: url.to_string(),
                    message: format!("Unexpected status {}", status),
                });
            }

            let bytes = match response.bytes().await {
                Ok(bytes) => bytes,
                Err(e) => {
                    failures += 1;
                    self.retry_or_fail(url, failures, Some(status), describe(&e))
                        .await?;
                    continue;
                }
            };

            return serde_json::from_slice(&bytes).map_err(|e| TransportError::Protocol {
                url: url.to_string(),
                message: format!("Invalid JSON body: {}", e),
            });
        }
    }

    /// Sleeps the backoff for a transient failure, or gives up when the
    /// attempt budget is spent
    async fn retry_or_fail(
        &self,
        url: &str,
        failures: u32,
        status: Option<StatusCode>,
        message: String,
    ) -> TransportResult<()> {
        if failures >= self.policy.max_attempts {
            tracing::error!(
                "Giving up on {} after {} attempts: {}",
                url,
                failures,
                message
            );
            return Err(TransportError::Transient {
                url: url.to_string(),
                attempts: failures,
                status: status.map(|s| s.as_u16()),
                message,
            });
        }

        let delay = self.policy.backoff_for(failures);
        tracing::warn!(
            "Attempt {}/{} for {} failed ({}); retrying in {:?}",
            failures,
            self.policy.max_attempts,
            url,
            message,
            delay
        );
        self.clock().sleep(delay).await;
        Ok(())
    }
}

fn describe(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "Request timeout".to_string()
    } else if e.is_connect() {
        "Connection failed".to_string()
    } else {
        e.to_string()
    }
}

fn truncate_on_char_boundary(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}
