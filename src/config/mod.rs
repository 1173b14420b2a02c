//! Configuration module
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! and the per-run `CrawlerOptions` the crawler is started with.
//!
//! # Example
//!
//! ```no_run
//! use news_crawler::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawler.toml")).unwrap();
//! println!("Crawler will keep {} fetches in flight", config.crawler.max_concurrent);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlerOptions, SelectorConfig, SourceConfig, StorageConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};

pub use validation::{validate_options, validate_seed_url};
