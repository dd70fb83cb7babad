//! Minimum-interval pacing between outbound requests

use crate::crawler::clock::Clock;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Enforces a minimum gap between consecutive requests
#[derive(Debug, Clone)]
pub struct Throttler {
    interval: Option<Duration>,
    clock: Arc<dyn Clock>,
}

impl Throttler {
    /// Creates a throttler with an explicit interval; `None` disables pacing
    pub fn new(interval: Option<Duration>, clock: Arc<dyn Clock>) -> Self {
        Self { interval, clock }
    }

    /// Interval of `60s / rpm`; zero disables pacing
    pub fn from_requests_per_minute(rpm: u32, clock: Arc<dyn Clock>) -> Self {
        let interval = (rpm > 0).then(|| Duration::from_secs(60) / rpm);
        Self::new(interval, clock)
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Time remaining before the next request is allowed
    ///
    /// Returns None if a request can be made now.
    pub fn time_until_next_request(&self, last: Option<Instant>, now: Instant) -> Option<Duration> {
        let interval = self.interval?;
        let elapsed = now.saturating_duration_since(last?);
        (elapsed < interval).then(|| interval - elapsed)
    }

    /// Sleeps until the interval since `last` has passed
    ///
    /// Returns the instant the caller should record as its new last-request
    /// time.
    pub async fn wait_turn(&self, last: Option<Instant>) -> Instant {
        let now = self.clock.now();
        if let Some(wait) = self.time_until_next_request(last, now) {
            tracing::trace!("Throttling for {:?}", wait);
            self.clock.sleep(wait).await;
        }
        self.clock.now()
    }
}
