//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlStatus`: lifecycle of a crawl run (idle, running, paused, stopped, error)
//! - `CrawlerStats`: run-scoped counters and recorded errors
//! - `StatsTracker`: the synchronized handle workers update

mod crawl_status;
pub mod stats;

pub use crawl_status::CrawlStatus;
pub use stats::{CrawlErrorRecord, CrawlerStats, ErrorKind, StatsTracker, TaskOutcome};
