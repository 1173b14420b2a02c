//! Storage traits and error types
//!
//! This module defines the trait interface for article store backends and
//! associated error types.

use crate::article::{Article, StoredArticle};
use crate::state::CrawlerStats;
use crate::storage::RunRecord;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Article not found: {0}")]
    ArticleNotFound(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Article already stored: {0}")]
    Duplicate(String),

    #[error("Article is missing required field '{field}': {url}")]
    Incomplete { url: String, field: &'static str },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for article store implementations
///
/// The store is an external collaborator: it only has to look articles up by
/// canonical URL and insert or overwrite whole records. Merging is done by the
/// crawler's persister, which holds the store lock across lookup and write.
pub trait ArticleStore: Send {
    /// Checks that the store is reachable
    fn ping(&self) -> StorageResult<()>;

    // ===== Articles =====

    /// Finds an article by its canonical URL
    fn find_by_url(&self, url: &str) -> StorageResult<Option<StoredArticle>>;

    /// Gets an article by id
    fn get_article(&self, id: i64) -> StorageResult<StoredArticle>;

    /// Inserts a new article and assigns its id
    ///
    /// Fails with `Duplicate` if the URL is already stored.
    fn insert_article(&mut self, article: &Article) -> StorageResult<StoredArticle>;

    /// Overwrites an existing article (matched by id)
    fn update_article(&mut self, article: &StoredArticle) -> StorageResult<()>;

    /// Counts stored articles
    fn count_articles(&self) -> StorageResult<u64>;

    /// Lists stored articles, newest publication first
    fn list_articles(&self) -> StorageResult<Vec<StoredArticle>>;

    // ===== Run Ledger =====

    /// Records the start of a crawl run
    fn create_run(&mut self, options_fingerprint: &str, started_at: DateTime<Utc>)
        -> StorageResult<i64>;

    /// Records the final stats of a crawl run
    fn finish_run(&mut self, run_id: i64, stats: &CrawlerStats) -> StorageResult<()>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;
}
