//! Concurrency limiter for article tasks
//!
//! This module handles:
//! - Bounding the number of tasks executing at once via a semaphore
//! - Spacing task dispatches by a minimum delay

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

/// Returned when the limiter's semaphore was closed before a slot became free
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Limiter closed")]
pub struct LimiterClosed;

/// A held execution slot; dropping it frees the slot
#[derive(Debug)]
pub struct DispatchPermit {
    _permit: OwnedSemaphorePermit,
}

/// Limiter caps in-flight tasks and spaces their starts
///
/// The limiter coordinates:
/// - A global concurrency limit (at most `max_concurrent` permits out)
/// - A minimum delay between two consecutive dispatches
pub struct Limiter {
    /// Semaphore for limiting concurrent tasks
    semaphore: Arc<Semaphore>,

    max_concurrent: usize,

    /// Minimum spacing between dispatches
    delay: Duration,

    /// When the last permit was handed out
    last_dispatch: Mutex<Option<Instant>>,
}

impl Limiter {
    /// Creates a new limiter
    ///
    /// # Arguments
    ///
    /// * `max_concurrent` - Maximum tasks in flight (clamped to at least 1)
    /// * `delay` - Minimum time between two dispatches
    pub fn new(max_concurrent: usize, delay: Duration) -> Self {
        let max_concurrent = max_concurrent.max(1);

        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            delay,
            last_dispatch: Mutex::new(None),
        }
    }

    /// Waits for a free slot, then for the dispatch delay
    ///
    /// The returned permit must be held for the whole task.
    pub async fn acquire(&self) -> Result<DispatchPermit, LimiterClosed> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| LimiterClosed)?;

        let mut last = self.last_dispatch.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.delay;
            if ready_at > Instant::now() {
                tracing::trace!("Waiting {:?} before next dispatch", ready_at - Instant::now());
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());

        Ok(DispatchPermit { _permit: permit })
    }

    /// Runs `task` once a slot is free, holding the slot until it completes
    pub async fn submit<F>(&self, task: F) -> Result<F::Output, LimiterClosed>
    where
        F: Future,
    {
        let _permit = self.acquire().await?;
        Ok(task.await)
    }

    /// Number of permits currently held
    pub fn in_flight(&self) -> usize {
        self.max_concurrent - self.semaphore.available_permits()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}
