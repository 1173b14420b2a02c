//! Output module for reporting crawl results
//!
//! This module handles:
//! - Formatting run statistics for the terminal
//! - Exporting statistics as JSON
//! - Reading the last recorded run back from the ledger

pub mod stats;

pub use stats::{format_statistics, load_last_run, print_statistics, stats_to_json, RunReport};
