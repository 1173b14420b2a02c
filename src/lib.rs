//! News crawler: a polite crawl orchestration engine for news sites
//!
//! This crate fetches listing and article pages from a news source, extracts
//! normalized article records, and upserts them into a deduplicating store
//! keyed by canonical URL. Runs are bounded by a concurrency limiter and
//! observable through a live statistics snapshot.

pub mod article;
pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for crawl runs
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Seed URL unreachable: {url}: {source}")]
    SeedUnreachable {
        url: String,
        source: crawler::FetchError,
    },

    #[error("Article store unavailable: {0}")]
    StoreUnavailable(storage::StorageError),

    #[error("A crawl run is already active")]
    AlreadyRunning,

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: state::CrawlStatus,
        to: state::CrawlStatus,
    },

    #[error("Crawl task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing required option: {0}")]
    Missing(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

// Re-export commonly used types
pub use article::{Article, ArticleDraft, ArticleStatus, StoredArticle};
pub use config::{Config, CrawlerOptions};
pub use crawler::{crawl_default, Crawler, DEFAULT_SOURCE_URL};
pub use state::{CrawlStatus, CrawlerStats};
pub use crate::url::normalize_url;
