//! Crawler module for news site crawling
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with a retry decorator
//! - Listing walk and article discovery
//! - HTML parsing and article extraction
//! - Concurrency limiting of article tasks
//! - Article upserts and overall run coordination

/// Logs at info when `$verbose` is set, at debug otherwise
macro_rules! progress {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            tracing::info!($($arg)+)
        } else {
            tracing::debug!($($arg)+)
        }
    };
}

mod control;
mod coordinator;
mod discovery;
mod extractor;
mod fetcher;
mod limiter;
mod parser;
mod persister;
mod retry;

pub use coordinator::{crawl_default, Crawler, DEFAULT_SOURCE_URL};
pub use discovery::{listing_roots, CrawlTask, ListingRoot};
pub use extractor::{parse_published, resolve_image_url, ExtractionError, Extractor};
pub use fetcher::{build_http_client, FetchError, Fetcher, HttpFetcher};
pub use limiter::{DispatchPermit, Limiter, LimiterClosed};
pub use parser::{resolve_link, HtmlSourceStrategy, ListingPage, ParsedArticle, SourceStrategy};
pub use persister::{merge_draft, upsert_draft, Persister, SharedStore};
pub use retry::{RetryPolicy, RetryingFetcher};
