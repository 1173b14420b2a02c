//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the run lifecycle that ties the pipeline together:
//! - Validating options and opening a run in the ledger
//! - Running discovery and the article dispatcher side by side
//! - Processing each article: fetch, extract, persist, record
//! - Handling stop, pause and resume requests
//! - Finalizing statistics

use crate::article::StoredArticle;
use crate::config::{validate_options, validate_seed_url, CrawlerOptions};
use crate::crawler::control::{admit, stopped, RunSignal};
use crate::crawler::discovery::{CrawlTask, Discovery};
use crate::crawler::extractor::Extractor;
use crate::crawler::fetcher::{Fetcher, HttpFetcher};
use crate::crawler::limiter::{DispatchPermit, Limiter};
use crate::crawler::parser::{HtmlSourceStrategy, SourceStrategy};
use crate::crawler::persister::{Persister, SharedStore};
use crate::crawler::retry::{RetryPolicy, RetryingFetcher};
use crate::state::{CrawlStatus, CrawlerStats, StatsTracker, TaskOutcome};
use crate::storage::{ArticleStore, StorageError};
use crate::CrawlError;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use url::Url;

/// Listing crawled by `crawl_default`
pub const DEFAULT_SOURCE_URL: &str = "https://news.example.com/";

/// Orchestrates crawl runs against one article store
///
/// A crawler runs at most one crawl at a time. `stop`, `pause`, `resume` and
/// `stats` may be called from other tasks while `start` is in progress.
pub struct Crawler {
    store: SharedStore,
    fetcher: Arc<dyn Fetcher>,
    strategy: Arc<dyn SourceStrategy>,
    stats: StatsTracker,
    signal: watch::Sender<RunSignal>,
    active: watch::Sender<bool>,
}

impl Crawler {
    /// Creates a crawler with the HTTP fetcher and default HTML rules
    pub fn new<S: ArticleStore + 'static>(store: S) -> Result<Self, CrawlError> {
        Ok(Self::from_parts(
            Arc::new(Mutex::new(store)),
            Arc::new(HttpFetcher::new()?),
            Arc::new(HtmlSourceStrategy::default()),
        ))
    }

    pub fn from_parts(
        store: SharedStore,
        fetcher: Arc<dyn Fetcher>,
        strategy: Arc<dyn SourceStrategy>,
    ) -> Self {
        Self {
            store,
            fetcher,
            strategy,
            stats: StatsTracker::new(),
            signal: watch::channel(RunSignal::Run).0,
            active: watch::channel(false).0,
        }
    }

    pub fn with_strategy(mut self, strategy: Arc<dyn SourceStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// The store this crawler writes to
    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    /// Returns a snapshot of the current (or last) run's statistics
    pub fn stats(&self) -> CrawlerStats {
        self.stats.snapshot()
    }

    /// Crawls `seed_url` and returns the articles saved by this run
    ///
    /// # Errors
    ///
    /// * `Config` - invalid options or seed URL; statistics are left untouched
    /// * `AlreadyRunning` - another run is active on this crawler
    /// * `StoreUnavailable` - the store could not open a run
    /// * `SeedUnreachable` - the seed listing failed after all retries
    ///
    /// Per-article failures are not errors; they are counted in `stats()`.
    pub async fn start(
        &self,
        seed_url: &str,
        options: CrawlerOptions,
    ) -> Result<Vec<StoredArticle>, CrawlError> {
        validate_options(&options)?;
        let seed = validate_seed_url(seed_url)?;

        let _active = ActiveRun::enter(self)?;

        tracing::info!(
            "Starting crawl of {} ({} concurrent, {} pages per listing, max {} articles)",
            seed,
            options.max_concurrent,
            options.pages_to_crawl,
            options.max_articles
        );

        self.run(&seed, Arc::new(options)).await
    }

    /// Requests a stop and waits for in-flight articles to finish
    ///
    /// No new article is dispatched after the request. Does nothing when no
    /// run is active.
    pub async fn stop(&self) {
        let mut active = self.active.subscribe();
        if !*active.borrow_and_update() {
            return;
        }

        tracing::info!("Stop requested, waiting for in-flight articles");
        self.signal.send_replace(RunSignal::Stop);
        let _ = active.wait_for(|running| !*running).await;
    }

    /// Holds new dispatches until `resume`; in-flight articles keep going
    ///
    /// Fails with `InvalidTransition` unless a run is `running`.
    pub fn pause(&self) -> Result<(), CrawlError> {
        self.switch(CrawlStatus::Running, CrawlStatus::Paused, RunSignal::Run, RunSignal::Pause)?;
        tracing::info!("Crawl paused");
        Ok(())
    }

    /// Continues a paused run with its remaining queue
    ///
    /// Fails with `InvalidTransition` unless a run is `paused`.
    pub fn resume(&self) -> Result<(), CrawlError> {
        self.switch(CrawlStatus::Paused, CrawlStatus::Running, RunSignal::Pause, RunSignal::Run)?;
        tracing::info!("Crawl resumed");
        Ok(())
    }

    /// Applies a status change and its signal together
    ///
    /// Both happen under the signal lock, so a run that finishes concurrently
    /// either sees the new signal or rejects the status change.
    fn switch(
        &self,
        from: CrawlStatus,
        to: CrawlStatus,
        expected: RunSignal,
        next: RunSignal,
    ) -> Result<(), CrawlError> {
        let mut result = Ok(());
        self.signal.send_if_modified(|signal| {
            result = self.stats.transition_from(from, to);
            if result.is_ok() && *signal == expected {
                *signal = next;
                true
            } else {
                false
            }
        });
        result
    }

    async fn run(
        &self,
        seed: &Url,
        options: Arc<CrawlerOptions>,
    ) -> Result<Vec<StoredArticle>, CrawlError> {
        let run_id = match self.open_run(&options) {
            Ok(id) => id,
            Err(e) => {
                tracing::error!("Article store unavailable: {}", e);
                self.stats.record_fatal(seed.as_str(), e.to_string());
                return Err(CrawlError::StoreUnavailable(e));
            }
        };

        let fetcher: Arc<dyn Fetcher> = Arc::new(
            RetryingFetcher::new(self.fetcher.clone(), RetryPolicy::from_options(&options))
                .with_stats(self.stats.clone()),
        );
        let extractor = Extractor::new(self.strategy.clone());
        let (tx, rx) = mpsc::channel(options.max_concurrent);

        let discovery = Discovery {
            fetcher: fetcher.clone(),
            extractor: extractor.clone(),
            stats: self.stats.clone(),
            signal: self.signal.subscribe(),
            options: options.clone(),
        };
        let discovery = tokio::spawn(discovery.run(seed.clone(), tx));

        let worker = Arc::new(ArticleWorker {
            fetcher,
            extractor,
            persister: Persister::new(self.store.clone()),
            stats: self.stats.clone(),
            options: options.clone(),
        });
        let limiter = Limiter::new(options.max_concurrent, options.delay());
        let saved = self.dispatch(rx, &limiter, worker).await;

        let outcome = match discovery.await {
            Ok(outcome) => outcome,
            Err(e) => Err(CrawlError::Task(e)),
        };

        let result = match outcome {
            Ok(()) => {
                let stop_requested = *self.signal.borrow() == RunSignal::Stop;
                if let Err(e) = self.stats.transition(CrawlStatus::Stopped) {
                    tracing::warn!("Could not finalize run status: {}", e);
                }

                let stats = self.stats.snapshot();
                tracing::info!(
                    "Crawl {}: {} saved, {} failed, {} crawled, {} listing pages in {:?}",
                    if stop_requested { "stopped" } else { "completed" },
                    stats.articles_saved,
                    stats.failed,
                    stats.total_crawled,
                    stats.pages_crawled,
                    stats.duration().and_then(|d| d.to_std().ok()).unwrap_or_default()
                );
                Ok(saved)
            }
            Err(e) => {
                tracing::error!("Crawl failed: {}", e);
                let url = match &e {
                    CrawlError::SeedUnreachable { url, .. } => url.clone(),
                    _ => seed.to_string(),
                };
                self.stats.record_fatal(&url, e.to_string());
                Err(e)
            }
        };

        self.close_run(run_id);
        result
    }

    /// Admits queued tasks through the limiter until the queue drains or a
    /// stop is requested, then waits for every dispatched task
    async fn dispatch(
        &self,
        mut rx: mpsc::Receiver<CrawlTask>,
        limiter: &Limiter,
        worker: Arc<ArticleWorker>,
    ) -> Vec<StoredArticle> {
        let mut signal = self.signal.subscribe();
        let mut workers = JoinSet::new();

        loop {
            let task = tokio::select! {
                biased;
                _ = stopped(&mut signal) => break,
                task = rx.recv() => match task {
                    Some(task) => task,
                    None => break,
                },
            };

            let permit = tokio::select! {
                biased;
                _ = stopped(&mut signal) => break,
                permit = limiter.acquire() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            if !admit(&mut signal).await {
                break;
            }

            tracing::trace!("Dispatching {} ({} in flight)", task.url, limiter.in_flight());
            workers.spawn(worker.clone().process(task, permit));
        }

        // Unblocks discovery if it is waiting on a full queue
        drop(rx);

        let mut saved = Vec::new();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Some(stored)) => saved.push(stored),
                Ok(None) => {}
                Err(e) => tracing::error!("Article task failed: {}", e),
            }
        }
        saved
    }

    fn open_run(&self, options: &CrawlerOptions) -> Result<i64, StorageError> {
        let mut store = self.store.lock().map_err(|_| StorageError::LockPoisoned)?;
        store.ping()?;

        let started_at = self.stats.snapshot().start_time.unwrap_or_else(Utc::now);
        store.create_run(&options.fingerprint(), started_at)
    }

    fn close_run(&self, run_id: i64) {
        let stats = self.stats.snapshot();
        let finished = self
            .store
            .lock()
            .map_err(|_| StorageError::LockPoisoned)
            .and_then(|mut store| store.finish_run(run_id, &stats));

        if let Err(e) = finished {
            tracing::warn!("Failed to record run {}: {}", run_id, e);
        }
    }
}

/// Exclusive claim on a crawler for the length of one run
///
/// The claim is released only when the guard drops, after the run ledger has
/// been closed, so no second run can begin while this one is finishing.
struct ActiveRun<'a> {
    crawler: &'a Crawler,
}

impl<'a> ActiveRun<'a> {
    fn enter(crawler: &'a Crawler) -> Result<Self, CrawlError> {
        let claimed = crawler.active.send_if_modified(|active| {
            if *active {
                return false;
            }
            *active = true;
            // Stop or pause requests left over from an earlier run
            crawler.signal.send_replace(RunSignal::Run);
            true
        });
        if !claimed {
            return Err(CrawlError::AlreadyRunning);
        }

        if let Err(e) = crawler.stats.begin() {
            crawler.active.send_replace(false);
            return Err(e);
        }
        Ok(Self { crawler })
    }
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        // A dropped `start` future never reaches finalization
        if self.crawler.stats.status().is_active() {
            if let Err(e) = self.crawler.stats.transition(CrawlStatus::Stopped) {
                tracing::warn!("Could not finalize run status: {}", e);
            }
        }
        self.crawler.signal.send_replace(RunSignal::Run);
        self.crawler.active.send_replace(false);
    }
}

/// Everything an article task needs, shared by all tasks of a run
struct ArticleWorker {
    fetcher: Arc<dyn Fetcher>,
    extractor: Extractor,
    persister: Persister,
    stats: StatsTracker,
    options: Arc<CrawlerOptions>,
}

impl ArticleWorker {
    /// Fetches, extracts and persists one article, recording one outcome
    ///
    /// The permit is held until the article is written.
    async fn process(
        self: Arc<Self>,
        task: CrawlTask,
        _permit: DispatchPermit,
    ) -> Option<StoredArticle> {
        let body = match self
            .fetcher
            .fetch(&task.url, self.options.timeout(), &self.options.user_agent)
            .await
        {
            Ok(body) => body,
            Err(e) => {
                self.stats
                    .record_outcome(&task.url, TaskOutcome::FetchFailed(e.to_string()));
                return None;
            }
        };

        let mut draft = match self.extractor.extract(&body, &task.url) {
            Ok(draft) => draft,
            Err(e) => {
                tracing::warn!("Extraction failed for {}: {}", task.url, e);
                self.stats
                    .record_outcome(&task.url, TaskOutcome::ExtractionFailed(e.to_string()));
                return None;
            }
        };
        if draft.category.is_none() {
            draft.category = task.category.clone();
        }

        let persister = self.persister.clone();
        let persisted = tokio::task::spawn_blocking(move || persister.upsert(&draft)).await;

        match persisted {
            Ok(Ok(stored)) => {
                progress!(
                    self.options.debug,
                    "Saved article {}: {}",
                    stored.id,
                    stored.article.url
                );
                self.stats.record_outcome(&task.url, TaskOutcome::Saved);
                Some(stored)
            }
            Ok(Err(e)) => {
                tracing::error!("Failed to persist {}: {}", task.url, e);
                self.stats
                    .record_outcome(&task.url, TaskOutcome::PersistFailed(e.to_string()));
                None
            }
            Err(e) => {
                tracing::error!("Persist task for {} failed: {}", task.url, e);
                self.stats
                    .record_outcome(&task.url, TaskOutcome::PersistFailed(e.to_string()));
                None
            }
        }
    }
}

/// Crawls `DEFAULT_SOURCE_URL` with default options
pub async fn crawl_default<S: ArticleStore + 'static>(
    store: S,
) -> Result<Vec<StoredArticle>, CrawlError> {
    Crawler::new(store)?
        .start(DEFAULT_SOURCE_URL, CrawlerOptions::default())
        .await
}
