use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Main configuration structure for the crawler binary
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(default)]
    pub crawler: CrawlerOptions,
    pub storage: StorageConfig,
}

/// The news site being crawled
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Seed listing URL (usually the site front page or news index)
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// CSS selectors for listing and article pages
    #[serde(default)]
    pub selectors: SelectorConfig,
}

/// Per-run crawl options
///
/// Created once per invocation and never mutated while a run is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlerOptions {
    /// Maximum number of article pipelines in flight
    pub max_concurrent: usize,

    /// Minimum spacing between two dispatches (milliseconds)
    pub delay_ms: u64,

    /// Retries per fetch after the first attempt
    pub max_retries: u32,

    /// Per-fetch deadline (milliseconds)
    pub timeout_ms: u64,

    /// Pause between retry attempts (milliseconds, 0 = retry immediately)
    pub retry_backoff_ms: u64,

    pub user_agent: String,

    /// Listing pages to walk per listing root
    pub pages_to_crawl: u32,

    /// Stop discovering once this many unique article URLs are queued
    pub max_articles: usize,

    /// Category slugs whose listings are enumerated besides the seed
    pub categories: Vec<String>,

    /// Path template for category listings, relative to the seed
    pub category_path: String,

    /// Log every article outcome at info level
    pub debug: bool,
}

impl Default for CrawlerOptions {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            delay_ms: 250,
            max_retries: 2,
            timeout_ms: 15_000,
            retry_backoff_ms: 0,
            user_agent: format!("NewsCrawler/{}", env!("CARGO_PKG_VERSION")),
            pages_to_crawl: 1,
            max_articles: 50,
            categories: Vec::new(),
            category_path: "category/{slug}/".to_string(),
            debug: false,
        }
    }
}

impl CrawlerOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Hex SHA-256 of the serialized options, recorded with each run
    pub fn fingerprint(&self) -> String {
        let serialized = serde_json::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(serialized.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Source-specific extraction rules
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SelectorConfig {
    /// Anchors on a listing page that point at articles
    pub listing_links: String,
    /// Anchor or link element pointing at the next listing page
    pub next_page: String,
    /// Article headline (fallback after og:title)
    pub title: String,
    /// Article body container
    pub body: String,
    /// Excerpt/summary container
    pub excerpt: String,
    /// Byline element (fallback after the author meta tag)
    pub author: String,
    /// Element carrying the publication time (`datetime` attribute or text)
    pub published: String,
    /// Tag links
    pub tags: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            listing_links: "article h2 a[href], article h3 a[href], .entry-title a[href], .post-title a[href]"
                .to_string(),
            next_page: "link[rel='next'][href], a[rel='next'][href], .pagination a.next[href]".to_string(),
            title: "h1.entry-title, article h1, h1".to_string(),
            body: ".entry-content, article .content, article".to_string(),
            excerpt: ".entry-summary, .excerpt, .post-excerpt".to_string(),
            author: ".byline .author, .author-name, [rel='author']".to_string(),
            published: "time[datetime], .published".to_string(),
            tags: "a[rel='tag'], .tags a".to_string(),
        }
    }
}
