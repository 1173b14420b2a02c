//! Statistics reporting
//!
//! This module provides functionality for displaying the statistics of a
//! crawl run, live or loaded from the run ledger.

use crate::state::{CrawlerStats, ErrorKind};
use crate::storage::{ArticleStore, RunRecord, StorageError, StorageResult};

/// Errors shown in full before the rest are summarized
const MAX_LISTED_ERRORS: usize = 10;

/// A ledger entry with its decoded statistics
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run: RunRecord,
    pub stats: Option<CrawlerStats>,
    pub total_articles: u64,
}

/// Loads the most recent run and the store's article count
///
/// # Returns
///
/// * `Ok(None)` - No run has been recorded yet
/// * `Ok(Some(RunReport))` - Latest run; `stats` is `None` for unfinished runs
pub fn load_last_run(store: &dyn ArticleStore) -> StorageResult<Option<RunReport>> {
    let Some(run) = store.get_latest_run()? else {
        return Ok(None);
    };

    let stats = run
        .stats_json
        .as_deref()
        .map(serde_json::from_str::<CrawlerStats>)
        .transpose()
        .map_err(|e| StorageError::Serialization(e.to_string()))?;

    Ok(Some(RunReport {
        total_articles: store.count_articles()?,
        run,
        stats,
    }))
}

/// Serializes statistics as pretty-printed JSON
pub fn stats_to_json(stats: &CrawlerStats) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(stats)
}

/// Formats statistics as a human-readable report
pub fn format_statistics(stats: &CrawlerStats) -> String {
    let mut out = String::new();

    out.push_str("=== Crawl Statistics ===\n\n");

    out.push_str("Run:\n");
    out.push_str(&format!("  Status: {}\n", stats.status));
    if let Some(start) = stats.start_time {
        out.push_str(&format!("  Started: {}\n", start.to_rfc3339()));
    }
    if let Some(end) = stats.end_time {
        out.push_str(&format!("  Finished: {}\n", end.to_rfc3339()));
    }
    if let Some(duration) = stats.duration() {
        out.push_str(&format!(
            "  Duration: {:.1}s\n",
            duration.num_milliseconds() as f64 / 1000.0
        ));
    }
    out.push('\n');

    out.push_str("Discovery:\n");
    out.push_str(&format!("  Listing pages crawled: {}\n", stats.pages_crawled));
    out.push_str(&format!("  Article URLs discovered: {}\n\n", stats.urls_discovered));

    out.push_str("Articles:\n");
    out.push_str(&format!("  Crawled: {}\n", stats.total_crawled));
    out.push_str(&format!("  Found: {}\n", stats.articles_found));
    out.push_str(&format!("  Saved: {}\n", stats.articles_saved));
    out.push_str(&format!("  Failed: {}\n", stats.failed));
    out.push_str(&format!("  Retries: {}\n\n", stats.retries));

    if !stats.errors.is_empty() {
        out.push_str("Error Summary:\n");
        for kind in [
            ErrorKind::Fatal,
            ErrorKind::Listing,
            ErrorKind::Fetch,
            ErrorKind::Extraction,
            ErrorKind::Persist,
        ] {
            let count = stats.errors.iter().filter(|e| e.kind == kind).count();
            if count > 0 {
                out.push_str(&format!("  {:?}: {}\n", kind, count));
            }
        }

        for error in stats.errors.iter().take(MAX_LISTED_ERRORS) {
            out.push_str(&format!("  - {} {}\n", error.url, error.message));
        }
        if stats.errors.len() > MAX_LISTED_ERRORS {
            out.push_str(&format!(
                "  ... and {} more\n",
                stats.errors.len() - MAX_LISTED_ERRORS
            ));
        }
        out.push('\n');
    }

    let success_rate = if stats.total_crawled > 0 {
        (stats.success as f64 / stats.total_crawled as f64) * 100.0
    } else {
        0.0
    };
    out.push_str(&format!(
        "Success Rate: {:.1}% ({} / {} articles saved)\n",
        success_rate, stats.success, stats.total_crawled
    ));

    out
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlerStats) {
    print!("{}", format_statistics(stats));
}
