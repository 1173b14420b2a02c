//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the ArticleStore trait.

use crate::article::{Article, ArticleStatus, StoredArticle};
use crate::state::{CrawlStatus, CrawlerStats};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ArticleStore, StorageError, StorageResult};
use crate::storage::RunRecord;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;

const ARTICLE_COLUMNS: &str = "id, url, title, content, image_url, published_at, category, author,
     summary, tags, status, view_count, like_count, comment_count, is_featured, created_at, updated_at";

const RUN_COLUMNS: &str = "id, started_at, finished_at, options_fingerprint, status, stats_json";

/// SQLite storage backend
pub struct SqliteArticleStore {
    conn: Connection,
}

impl SqliteArticleStore {
    /// Opens or creates the database at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn parse_timestamp(idx: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_article(row: &Row<'_>) -> rusqlite::Result<StoredArticle> {
    let tags_json: String = row.get(9)?;
    let tags: Vec<String> = serde_json::from_str(&tags_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(9, Type::Text, Box::new(e)))?;

    Ok(StoredArticle {
        id: row.get(0)?,
        article: Article {
            url: row.get(1)?,
            title: row.get(2)?,
            content: row.get(3)?,
            image_url: row.get(4)?,
            published_at: parse_timestamp(5, row.get(5)?)?,
            category: row.get(6)?,
            author: row.get(7)?,
            summary: row.get(8)?,
            tags,
            status: ArticleStatus::from_db_string(&row.get::<_, String>(10)?)
                .unwrap_or_default(),
            view_count: row.get::<_, i64>(11)?.max(0) as u64,
            like_count: row.get::<_, i64>(12)?.max(0) as u64,
            comment_count: row.get::<_, i64>(13)?.max(0) as u64,
            is_featured: row.get(14)?,
            created_at: parse_timestamp(15, row.get(15)?)?,
            updated_at: parse_timestamp(16, row.get(16)?)?,
        },
    })
}

fn row_to_run(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    let finished_at: Option<String> = row.get(2)?;
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: parse_timestamp(1, row.get(1)?)?,
        finished_at: finished_at.map(|s| parse_timestamp(2, s)).transpose()?,
        options_fingerprint: row.get(3)?,
        status: CrawlStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(CrawlStatus::Error),
        stats_json: row.get(5)?,
    })
}

fn tags_to_json(tags: &[String]) -> StorageResult<String> {
    serde_json::to_string(tags).map_err(|e| StorageError::Serialization(e.to_string()))
}

impl ArticleStore for SqliteArticleStore {
    fn ping(&self) -> StorageResult<()> {
        self.conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    // ===== Articles =====

    fn find_by_url(&self, url: &str) -> StorageResult<Option<StoredArticle>> {
        let sql = format!("SELECT {} FROM articles WHERE url = ?1", ARTICLE_COLUMNS);
        let article = self
            .conn
            .query_row(&sql, params![url], row_to_article)
            .optional()?;
        Ok(article)
    }

    fn get_article(&self, id: i64) -> StorageResult<StoredArticle> {
        let sql = format!("SELECT {} FROM articles WHERE id = ?1", ARTICLE_COLUMNS);
        self.conn
            .query_row(&sql, params![id], row_to_article)
            .optional()?
            .ok_or_else(|| StorageError::ArticleNotFound(format!("Article ID {}", id)))
    }

    fn insert_article(&mut self, article: &Article) -> StorageResult<StoredArticle> {
        let tags = tags_to_json(&article.tags)?;
        let result = self.conn.execute(
            "INSERT INTO articles (url, title, content, image_url, published_at, category, author,
             summary, tags, status, view_count, like_count, comment_count, is_featured,
             created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                article.url,
                article.title,
                article.content,
                article.image_url,
                article.published_at.to_rfc3339(),
                article.category,
                article.author,
                article.summary,
                tags,
                article.status.to_db_string(),
                article.view_count as i64,
                article.like_count as i64,
                article.comment_count as i64,
                article.is_featured,
                article.created_at.to_rfc3339(),
                article.updated_at.to_rfc3339(),
            ],
        );

        match result {
            Ok(_) => Ok(StoredArticle {
                id: self.conn.last_insert_rowid(),
                article: article.clone(),
            }),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(StorageError::Duplicate(article.url.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn update_article(&mut self, stored: &StoredArticle) -> StorageResult<()> {
        let article = &stored.article;
        let tags = tags_to_json(&article.tags)?;
        let updated = self.conn.execute(
            "UPDATE articles SET url = ?1, title = ?2, content = ?3, image_url = ?4,
             published_at = ?5, category = ?6, author = ?7, summary = ?8, tags = ?9, status = ?10,
             view_count = ?11, like_count = ?12, comment_count = ?13, is_featured = ?14,
             created_at = ?15, updated_at = ?16
             WHERE id = ?17",
            params![
                article.url,
                article.title,
                article.content,
                article.image_url,
                article.published_at.to_rfc3339(),
                article.category,
                article.author,
                article.summary,
                tags,
                article.status.to_db_string(),
                article.view_count as i64,
                article.like_count as i64,
                article.comment_count as i64,
                article.is_featured,
                article.created_at.to_rfc3339(),
                article.updated_at.to_rfc3339(),
                stored.id,
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::ArticleNotFound(format!(
                "Article ID {}",
                stored.id
            )));
        }
        Ok(())
    }

    fn count_articles(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn list_articles(&self) -> StorageResult<Vec<StoredArticle>> {
        let sql = format!(
            "SELECT {} FROM articles ORDER BY published_at DESC, id DESC",
            ARTICLE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let articles = stmt
            .query_map([], row_to_article)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(articles)
    }

    // ===== Run Ledger =====

    fn create_run(
        &mut self,
        options_fingerprint: &str,
        started_at: DateTime<Utc>,
    ) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO runs (started_at, options_fingerprint, status) VALUES (?1, ?2, ?3)",
            params![
                started_at.to_rfc3339(),
                options_fingerprint,
                CrawlStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(&mut self, run_id: i64, stats: &CrawlerStats) -> StorageResult<()> {
        let stats_json =
            serde_json::to_string(stats).map_err(|e| StorageError::Serialization(e.to_string()))?;
        let finished_at = stats.end_time.unwrap_or_else(Utc::now).to_rfc3339();

        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, stats_json = ?3 WHERE id = ?4",
            params![stats.status.to_db_string(), finished_at, stats_json, run_id],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS);
        let run = self.conn.query_row(&sql, [], row_to_run).optional()?;
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::DEFAULT_CATEGORY;
    use chrono::TimeZone;

    fn sample_article(url: &str) -> Article {
        let now = Utc::now();
        Article {
            title: "Council approves budget".to_string(),
            content: "The council voted on Tuesday.".to_string(),
            url: url.to_string(),
            image_url: Some("https://cdn.example.com/budget.jpg".to_string()),
            published_at: Utc.with_ymd_and_hms(2024, 5, 6, 9, 30, 0).unwrap(),
            category: DEFAULT_CATEGORY.to_string(),
            author: Some("Jane Reporter".to_string()),
            summary: None,
            tags: vec!["budget".to_string(), "council".to_string()],
            status: ArticleStatus::Published,
            view_count: 3,
            like_count: 0,
            comment_count: 1,
            is_featured: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_create_in_memory() {
        let storage = SqliteArticleStore::new_in_memory().unwrap();
        assert!(storage.ping().is_ok());
        assert_eq!(storage.count_articles().unwrap(), 0);
    }

    #[test]
    fn test_insert_and_find_by_url() {
        let mut storage = SqliteArticleStore::new_in_memory().unwrap();
        let article = sample_article("https://news.example.com/budget/");

        let stored = storage.insert_article(&article).unwrap();
        assert!(stored.id > 0);

        let found = storage
            .find_by_url("https://news.example.com/budget/")
            .unwrap()
            .unwrap();
        assert_eq!(found.id, stored.id);
        assert_eq!(found.article, article);
    }

    #[test]
    fn test_find_missing_url() {
        let storage = SqliteArticleStore::new_in_memory().unwrap();
        assert!(storage.find_by_url("https://nope").unwrap().is_none());
    }

    #[test]
    fn test_insert_duplicate_url_rejected() {
        let mut storage = SqliteArticleStore::new_in_memory().unwrap();
        let article = sample_article("https://news.example.com/budget/");

        storage.insert_article(&article).unwrap();
        let result = storage.insert_article(&article);

        assert!(matches!(result, Err(StorageError::Duplicate(_))));
        assert_eq!(storage.count_articles().unwrap(), 1);
    }

    #[test]
    fn test_update_article() {
        let mut storage = SqliteArticleStore::new_in_memory().unwrap();
        let mut stored = storage
            .insert_article(&sample_article("https://news.example.com/budget/"))
            .unwrap();

        stored.article.title = "Council approves revised budget".to_string();
        stored.article.tags.push("finance".to_string());
        storage.update_article(&stored).unwrap();

        let loaded = storage.get_article(stored.id).unwrap();
        assert_eq!(loaded.article.title, "Council approves revised budget");
        assert_eq!(loaded.article.tags, vec!["budget", "council", "finance"]);
    }

    #[test]
    fn test_update_missing_article() {
        let mut storage = SqliteArticleStore::new_in_memory().unwrap();
        let stored = StoredArticle {
            id: 99,
            article: sample_article("https://news.example.com/x/"),
        };
        assert!(matches!(
            storage.update_article(&stored),
            Err(StorageError::ArticleNotFound(_))
        ));
    }

    #[test]
    fn test_list_articles_newest_first() {
        let mut storage = SqliteArticleStore::new_in_memory().unwrap();
        let mut older = sample_article("https://news.example.com/older/");
        older.published_at = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        storage.insert_article(&older).unwrap();
        storage
            .insert_article(&sample_article("https://news.example.com/newer/"))
            .unwrap();

        let articles = storage.list_articles().unwrap();
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].article.url, "https://news.example.com/newer/");
    }

    #[test]
    fn test_run_ledger() {
        let mut storage = SqliteArticleStore::new_in_memory().unwrap();
        assert!(storage.get_latest_run().unwrap().is_none());

        let run_id = storage.create_run("abc123", Utc::now()).unwrap();
        let running = storage.get_latest_run().unwrap().unwrap();
        assert_eq!(running.id, run_id);
        assert_eq!(running.status, CrawlStatus::Running);
        assert!(running.finished_at.is_none());

        let stats = CrawlerStats {
            status: CrawlStatus::Stopped,
            end_time: Some(Utc::now()),
            success: 2,
            total_crawled: 2,
            ..CrawlerStats::default()
        };
        storage.finish_run(run_id, &stats).unwrap();

        let finished = storage.get_latest_run().unwrap().unwrap();
        assert_eq!(finished.status, CrawlStatus::Stopped);
        assert!(finished.finished_at.is_some());
        let saved: CrawlerStats =
            serde_json::from_str(finished.stats_json.as_deref().unwrap()).unwrap();
        assert_eq!(saved.total_crawled, 2);
    }

    #[test]
    fn test_finish_missing_run() {
        let mut storage = SqliteArticleStore::new_in_memory().unwrap();
        let result = storage.finish_run(42, &CrawlerStats::default());
        assert!(matches!(result, Err(StorageError::RunNotFound(42))));
    }
}
