//! Storage module for persisting crawled articles
//!
//! This module handles all persistence for the crawler, including:
//! - The `ArticleStore` trait the crawler is constructed with
//! - A SQLite-backed store and an in-memory store
//! - The run ledger recording each crawl's final statistics

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemoryArticleStore;
pub use sqlite::SqliteArticleStore;
pub use traits::{ArticleStore, StorageError, StorageResult};

use crate::state::CrawlStatus;
use chrono::{DateTime, Utc};
use std::path::Path;

/// Opens (or creates) a SQLite article database
pub fn open_storage(path: &Path) -> StorageResult<SqliteArticleStore> {
    SqliteArticleStore::new(path)
}

/// Represents a crawl run in the ledger
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub options_fingerprint: String,
    pub status: CrawlStatus,
    /// Final `CrawlerStats` as JSON
    pub stats_json: Option<String>,
}
