//! Run-scoped crawl statistics
//!
//! `CrawlerStats` is the only state shared by every worker of a run. All
//! mutation goes through `StatsTracker`, which updates related counters under a
//! single lock so a snapshot never observes half of an outcome.

use crate::state::CrawlStatus;
use crate::CrawlError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Which stage of the pipeline produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Listing,
    Fetch,
    Extraction,
    Persist,
    Fatal,
}

/// One recorded error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlErrorRecord {
    pub url: String,
    pub kind: ErrorKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Snapshot of a run's counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlerStats {
    pub status: CrawlStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Listing pages fetched and parsed
    pub pages_crawled: u64,
    /// Unique article URLs queued for crawling
    pub urls_discovered: u64,
    /// Article pages fetched and extracted
    pub articles_found: u64,
    /// Articles upserted into the store
    pub articles_saved: u64,
    pub success: u64,
    pub failed: u64,
    pub total_crawled: u64,
    /// Fetch attempts beyond the first, across all URLs
    pub retries: u64,
    pub errors: Vec<CrawlErrorRecord>,
}

impl CrawlerStats {
    /// Checks the counter invariants
    ///
    /// `success + failed == total_crawled` always holds; the ordering
    /// `saved <= found <= total` is only guaranteed outside `running`.
    pub fn is_consistent(&self) -> bool {
        if self.success + self.failed != self.total_crawled {
            return false;
        }
        if self.status == CrawlStatus::Running {
            return true;
        }
        self.articles_saved <= self.articles_found && self.articles_found <= self.total_crawled
    }

    /// Wall-clock duration of the run, if it has finished
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

/// Terminal result of one article task
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// Fetched, extracted and upserted
    Saved,
    /// Fetch failed after exhausting retries
    FetchFailed(String),
    /// Page fetched but not extractable
    ExtractionFailed(String),
    /// Extracted but the store rejected the write
    PersistFailed(String),
}

/// Shared handle over the current run's stats
#[derive(Debug, Clone, Default)]
pub struct StatsTracker {
    inner: Arc<Mutex<CrawlerStats>>,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CrawlerStats> {
        // Every update leaves the stats whole, so a poisoned lock is still usable
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a copy of the current stats
    pub fn snapshot(&self) -> CrawlerStats {
        self.lock().clone()
    }

    pub fn status(&self) -> CrawlStatus {
        self.lock().status
    }

    /// Replaces the stats with a fresh instance in `running`
    ///
    /// Fails with `AlreadyRunning` while another run owns the tracker.
    pub fn begin(&self) -> Result<(), CrawlError> {
        let mut stats = self.lock();
        if stats.status.is_active() {
            return Err(CrawlError::AlreadyRunning);
        }

        *stats = CrawlerStats::default();
        Self::apply_transition(&mut stats, CrawlStatus::Running)
    }

    /// Moves the run to another status
    pub fn transition(&self, to: CrawlStatus) -> Result<(), CrawlError> {
        let mut stats = self.lock();
        Self::apply_transition(&mut stats, to)
    }

    /// Moves the run to `to` only if it is currently in `from`
    pub fn transition_from(&self, from: CrawlStatus, to: CrawlStatus) -> Result<(), CrawlError> {
        let mut stats = self.lock();
        if stats.status != from {
            return Err(CrawlError::InvalidTransition {
                from: stats.status,
                to,
            });
        }
        Self::apply_transition(&mut stats, to)
    }

    fn apply_transition(stats: &mut CrawlerStats, to: CrawlStatus) -> Result<(), CrawlError> {
        let from = stats.status;
        if !from.can_transition_to(to) {
            return Err(CrawlError::InvalidTransition { from, to });
        }

        let now = Utc::now();
        if from == CrawlStatus::Idle {
            stats.start_time = Some(now);
        }
        if to.is_terminal() {
            stats.end_time = Some(now);
        }
        stats.status = to;
        Ok(())
    }

    pub fn record_page(&self) {
        self.lock().pages_crawled += 1;
    }

    pub fn record_discovered(&self, count: u64) {
        self.lock().urls_discovered += count;
    }

    pub fn record_retry(&self) {
        self.lock().retries += 1;
    }

    /// Records an error that is not an article outcome (e.g. a listing page)
    pub fn record_error(&self, url: &str, kind: ErrorKind, message: impl Into<String>) {
        let mut stats = self.lock();
        push_error(&mut stats, url, kind, message.into());
    }

    /// Records the single terminal outcome of an article task
    pub fn record_outcome(&self, url: &str, outcome: TaskOutcome) {
        let mut stats = self.lock();
        stats.total_crawled += 1;

        match outcome {
            TaskOutcome::Saved => {
                stats.articles_found += 1;
                stats.articles_saved += 1;
                stats.success += 1;
            }
            TaskOutcome::FetchFailed(message) => {
                stats.failed += 1;
                push_error(&mut stats, url, ErrorKind::Fetch, message);
            }
            TaskOutcome::ExtractionFailed(message) => {
                stats.failed += 1;
                push_error(&mut stats, url, ErrorKind::Extraction, message);
            }
            TaskOutcome::PersistFailed(message) => {
                stats.articles_found += 1;
                stats.failed += 1;
                push_error(&mut stats, url, ErrorKind::Persist, message);
            }
        }
    }

    /// Records an unrecoverable condition and moves the run to `error`
    pub fn record_fatal(&self, url: &str, message: impl Into<String>) {
        let mut stats = self.lock();
        push_error(&mut stats, url, ErrorKind::Fatal, message.into());
        if let Err(e) = Self::apply_transition(&mut stats, CrawlStatus::Error) {
            tracing::warn!("Could not mark run as failed: {}", e);
        }
    }
}

fn push_error(stats: &mut CrawlerStats, url: &str, kind: ErrorKind, message: String) {
    stats.errors.push(CrawlErrorRecord {
        url: url.to_string(),
        kind,
        message,
        at: Utc::now(),
    });
}
