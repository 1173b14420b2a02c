//! Retry decorator for fetchers
//!
//! All retrying in the crawler goes through `RetryingFetcher`, so listing and
//! article fetches share one policy and every extra attempt shows up in the
//! run's `retries` counter.

use crate::config::CrawlerOptions;
use crate::crawler::fetcher::{FetchError, Fetcher};
use crate::state::StatsTracker;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// How many times a failed fetch is re-attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub max_retries: u32,
    /// Pause before each retry
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    pub fn from_options(options: &CrawlerOptions) -> Self {
        Self::new(options.max_retries, options.retry_backoff())
    }
}

/// Wraps a fetcher and re-attempts failed fetches per `RetryPolicy`
///
/// Exhausting the budget returns the last error once, so the caller counts a
/// single failure for the URL.
pub struct RetryingFetcher {
    inner: Arc<dyn Fetcher>,
    policy: RetryPolicy,
    stats: Option<StatsTracker>,
}

impl RetryingFetcher {
    pub fn new(inner: Arc<dyn Fetcher>, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            stats: None,
        }
    }

    /// Counts each retry in the given tracker
    pub fn with_stats(mut self, stats: StatsTracker) -> Self {
        self.stats = Some(stats);
        self
    }
}

#[async_trait]
impl Fetcher for RetryingFetcher {
    async fn fetch(
        &self,
        url: &str,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<String, FetchError> {
        let mut attempt = 0;

        loop {
            match self.inner.fetch(url, timeout, user_agent).await {
                Ok(body) => return Ok(body),
                Err(e) if attempt < self.policy.max_retries => {
                    attempt += 1;
                    tracing::debug!(
                        url,
                        attempt,
                        max_retries = self.policy.max_retries,
                        "Retrying fetch: {}",
                        e
                    );
                    if let Some(stats) = &self.stats {
                        stats.record_retry();
                    }
                    if !self.policy.backoff.is_zero() {
                        tokio::time::sleep(self.policy.backoff).await;
                    }
                }
                Err(e) => {
                    tracing::warn!(url, attempts = attempt + 1, "Fetch failed: {}", e);
                    return Err(e);
                }
            }
        }
    }
}
