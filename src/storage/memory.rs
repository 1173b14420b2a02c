//! In-memory storage implementation
//!
//! Backs tests and embedders that do not need durability. Mirrors the SQLite
//! store's semantics, including the unique canonical URL.

use crate::article::{Article, StoredArticle};
use crate::state::{CrawlStatus, CrawlerStats};
use crate::storage::traits::{ArticleStore, StorageError, StorageResult};
use crate::storage::RunRecord;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default)]
pub struct MemoryArticleStore {
    articles: BTreeMap<i64, StoredArticle>,
    by_url: HashMap<String, i64>,
    runs: Vec<RunRecord>,
    next_id: i64,
}

impl MemoryArticleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArticleStore for MemoryArticleStore {
    fn ping(&self) -> StorageResult<()> {
        Ok(())
    }

    fn find_by_url(&self, url: &str) -> StorageResult<Option<StoredArticle>> {
        Ok(self
            .by_url
            .get(url)
            .and_then(|id| self.articles.get(id))
            .cloned())
    }

    fn get_article(&self, id: i64) -> StorageResult<StoredArticle> {
        self.articles
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::ArticleNotFound(format!("Article ID {}", id)))
    }

    fn insert_article(&mut self, article: &Article) -> StorageResult<StoredArticle> {
        if self.by_url.contains_key(&article.url) {
            return Err(StorageError::Duplicate(article.url.clone()));
        }

        self.next_id += 1;
        let stored = StoredArticle {
            id: self.next_id,
            article: article.clone(),
        };
        self.by_url.insert(article.url.clone(), stored.id);
        self.articles.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn update_article(&mut self, stored: &StoredArticle) -> StorageResult<()> {
        let previous_url = match self.articles.get(&stored.id) {
            Some(existing) => existing.article.url.clone(),
            None => {
                return Err(StorageError::ArticleNotFound(format!(
                    "Article ID {}",
                    stored.id
                )))
            }
        };

        if previous_url != stored.article.url {
            if self.by_url.contains_key(&stored.article.url) {
                return Err(StorageError::Duplicate(stored.article.url.clone()));
            }
            self.by_url.remove(&previous_url);
            self.by_url.insert(stored.article.url.clone(), stored.id);
        }

        self.articles.insert(stored.id, stored.clone());
        Ok(())
    }

    fn count_articles(&self) -> StorageResult<u64> {
        Ok(self.articles.len() as u64)
    }

    fn list_articles(&self) -> StorageResult<Vec<StoredArticle>> {
        let mut articles: Vec<_> = self.articles.values().cloned().collect();
        articles.sort_by(|a, b| {
            b.article
                .published_at
                .cmp(&a.article.published_at)
                .then(b.id.cmp(&a.id))
        });
        Ok(articles)
    }

    fn create_run(
        &mut self,
        options_fingerprint: &str,
        started_at: DateTime<Utc>,
    ) -> StorageResult<i64> {
        let id = self.runs.len() as i64 + 1;
        self.runs.push(RunRecord {
            id,
            started_at,
            finished_at: None,
            options_fingerprint: options_fingerprint.to_string(),
            status: CrawlStatus::Running,
            stats_json: None,
        });
        Ok(id)
    }

    fn finish_run(&mut self, run_id: i64, stats: &CrawlerStats) -> StorageResult<()> {
        let run = self
            .runs
            .iter_mut()
            .find(|r| r.id == run_id)
            .ok_or(StorageError::RunNotFound(run_id))?;

        run.status = stats.status;
        run.finished_at = Some(stats.end_time.unwrap_or_else(Utc::now));
        run.stats_json = Some(
            serde_json::to_string(stats).map_err(|e| StorageError::Serialization(e.to_string()))?,
        );
        Ok(())
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        Ok(self.runs.last().cloned())
    }
}
