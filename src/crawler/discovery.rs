//! Listing walk that feeds article tasks to the dispatcher
//!
//! Discovery visits each listing root (the seed, then one listing per
//! configured category), follows pagination up to `pages-to-crawl` pages per
//! root, and queues every unseen article URL until `max-articles` is reached.

use crate::article::slugify;
use crate::config::CrawlerOptions;
use crate::crawler::control::{admit, RunSignal};
use crate::crawler::extractor::Extractor;
use crate::crawler::fetcher::Fetcher;
use crate::state::{ErrorKind, StatsTracker};
use crate::url::normalize_url;
use crate::CrawlError;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use url::Url;

/// One article page waiting to be crawled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    /// Normalized article URL
    pub url: String,

    /// Category slug of the listing it was found on
    pub category: Option<String>,
}

/// A listing page that starts a pagination chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRoot {
    pub url: Url,
    pub category: Option<String>,
}

/// Builds the listing roots for a run: the seed first, then each category
pub fn listing_roots(seed: &Url, options: &CrawlerOptions) -> Vec<ListingRoot> {
    let mut roots = vec![ListingRoot {
        url: seed.clone(),
        category: None,
    }];
    let mut seen: HashSet<Url> = HashSet::from([seed.clone()]);

    for name in &options.categories {
        let slug = slugify(name);
        if slug.is_empty() {
            continue;
        }

        let path = options.category_path.replace("{slug}", &slug);
        match seed.join(&path) {
            Ok(url) if seen.insert(url.clone()) => roots.push(ListingRoot {
                url,
                category: Some(slug),
            }),
            Ok(_) => {}
            Err(e) => tracing::warn!("Skipping category '{}': {}", name, e),
        }
    }

    roots
}

pub(crate) struct Discovery {
    pub fetcher: Arc<dyn Fetcher>,
    pub extractor: Extractor,
    pub stats: StatsTracker,
    pub signal: watch::Receiver<RunSignal>,
    pub options: Arc<CrawlerOptions>,
}

impl Discovery {
    fn stop_requested(&self) -> bool {
        *self.signal.borrow() == RunSignal::Stop
    }

    /// Walks all listing roots, sending tasks into `tx`
    ///
    /// Only a seed that cannot be fetched is an error, and not once a stop
    /// was requested; any other listing failure is recorded and ends that
    /// root's pagination.
    pub async fn run(mut self, seed: Url, tx: mpsc::Sender<CrawlTask>) -> Result<(), CrawlError> {
        let options = self.options.clone();
        let timeout = options.timeout();
        let mut seen = HashSet::new();
        let mut queued = 0usize;

        'roots: for (index, root) in listing_roots(&seed, &options).into_iter().enumerate() {
            let mut next = Some(root.url.to_string());
            let mut page = 0u32;

            while let Some(page_url) = next.take() {
                if page >= options.pages_to_crawl || queued >= options.max_articles {
                    break;
                }
                if !admit(&mut self.signal).await {
                    tracing::debug!("Discovery stopped");
                    break 'roots;
                }
                page += 1;

                let body = match self
                    .fetcher
                    .fetch(&page_url, timeout, &options.user_agent)
                    .await
                {
                    Ok(body) => body,
                    Err(e) if self.stop_requested() => {
                        tracing::debug!("Discovery stopped while fetching {}: {}", page_url, e);
                        break 'roots;
                    }
                    Err(e) if index == 0 && page == 1 => {
                        return Err(CrawlError::SeedUnreachable {
                            url: page_url,
                            source: e,
                        });
                    }
                    Err(e) => {
                        tracing::warn!("Listing page {} failed: {}", page_url, e);
                        self.stats.record_error(&page_url, ErrorKind::Listing, e.to_string());
                        break;
                    }
                };

                let listing = match self.extractor.parse_listing(&body, &page_url) {
                    Ok(listing) => listing,
                    Err(e) => {
                        tracing::warn!("Could not parse listing {}: {}", page_url, e);
                        self.stats.record_error(&page_url, ErrorKind::Listing, e.to_string());
                        break;
                    }
                };
                self.stats.record_page();

                let mut added = 0u64;
                for link in listing.article_urls {
                    if queued >= options.max_articles {
                        break;
                    }

                    let url = match normalize_url(&link) {
                        Ok(url) => url.to_string(),
                        Err(e) => {
                            tracing::debug!("Failed to normalize URL {}: {}", link, e);
                            continue;
                        }
                    };
                    if !seen.insert(url.clone()) {
                        continue;
                    }

                    queued += 1;
                    added += 1;
                    self.stats.record_discovered(1);

                    let task = CrawlTask {
                        url,
                        category: root.category.clone(),
                    };
                    if tx.send(task).await.is_err() {
                        // Dispatcher is gone, so the run is ending
                        break 'roots;
                    }
                }

                progress!(
                    options.debug,
                    "Listing {} (page {}): {} new articles, {} queued",
                    page_url,
                    page,
                    added,
                    queued
                );

                next = listing.next_page;
            }
        }

        Ok(())
    }
}
