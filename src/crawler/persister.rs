//! Article upserts
//!
//! A draft is matched to a stored article by canonical URL, then by its alias
//! URL. Matches are merged field by field: a field the draft carries replaces
//! the stored value, a field it lacks leaves the stored value alone. Counters,
//! `created_at` and the id never change on update.

use crate::article::{dedupe_tags, non_empty, Article, ArticleDraft, StoredArticle, DEFAULT_CATEGORY};
use crate::storage::{ArticleStore, StorageError, StorageResult};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

/// Store handle shared by the crawler and its workers
pub type SharedStore = Arc<Mutex<dyn ArticleStore>>;

/// Upserts drafts into a shared store
#[derive(Clone)]
pub struct Persister {
    store: SharedStore,
}

impl Persister {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Upserts one draft, holding the store lock for lookup and write
    pub fn upsert(&self, draft: &ArticleDraft) -> StorageResult<StoredArticle> {
        let mut store = self.store.lock().map_err(|_| StorageError::LockPoisoned)?;
        upsert_draft(&mut *store, draft, Utc::now())
    }
}

/// Inserts `draft` or merges it into the article it matches
pub fn upsert_draft(
    store: &mut dyn ArticleStore,
    draft: &ArticleDraft,
    now: DateTime<Utc>,
) -> StorageResult<StoredArticle> {
    let existing = match store.find_by_url(&draft.url)? {
        Some(found) => Some(found),
        None => match non_empty(&draft.link) {
            Some(alias) if alias != draft.url => store.find_by_url(alias)?,
            _ => None,
        },
    };

    match existing {
        Some(mut stored) => {
            tracing::trace!("Updating article {} ({})", stored.id, draft.url);
            merge_draft(&mut stored.article, draft, now);
            store.update_article(&stored)?;
            Ok(stored)
        }
        None => {
            tracing::trace!("Inserting article {}", draft.url);
            let article = new_article(draft, now)?;
            store.insert_article(&article)
        }
    }
}

/// Merges a draft into a stored article without erasing anything
pub fn merge_draft(article: &mut Article, draft: &ArticleDraft, now: DateTime<Utc>) {
    if !draft.url.trim().is_empty() {
        article.url = draft.url.clone();
    }
    if let Some(title) = non_empty(&draft.title) {
        article.title = title.to_string();
    }
    if let Some(content) = non_empty(&draft.content) {
        article.content = content.to_string();
    }
    if let Some(image_url) = non_empty(&draft.image_url) {
        article.image_url = Some(image_url.to_string());
    }
    if let Some(published_at) = draft.published_at {
        article.published_at = published_at;
    }
    if let Some(category) = non_empty(&draft.category) {
        article.category = category.to_string();
    }
    if let Some(author) = non_empty(&draft.author) {
        article.author = Some(author.to_string());
    }
    if let Some(summary) = non_empty(&draft.summary) {
        article.summary = Some(summary.to_string());
    }

    let tags = dedupe_tags(&draft.tags);
    if !tags.is_empty() {
        article.tags = tags;
    }

    if let Some(status) = draft.status {
        article.status = status;
    }
    if let Some(is_featured) = draft.is_featured {
        article.is_featured = is_featured;
    }

    article.updated_at = now;
}

/// Builds a new article from a draft that matched nothing
///
/// Title and publication time are required; category falls back to
/// `uncategorized`.
fn new_article(draft: &ArticleDraft, now: DateTime<Utc>) -> StorageResult<Article> {
    let incomplete = |field: &'static str| StorageError::Incomplete {
        url: draft.url.clone(),
        field,
    };

    let title = non_empty(&draft.title).ok_or_else(|| incomplete("title"))?;
    let published_at = draft.published_at.ok_or_else(|| incomplete("published_at"))?;

    Ok(Article {
        title: title.to_string(),
        content: non_empty(&draft.content).unwrap_or_default().to_string(),
        url: draft.url.clone(),
        image_url: non_empty(&draft.image_url).map(str::to_string),
        published_at,
        category: non_empty(&draft.category)
            .unwrap_or(DEFAULT_CATEGORY)
            .to_string(),
        author: non_empty(&draft.author).map(str::to_string),
        summary: non_empty(&draft.summary).map(str::to_string),
        tags: dedupe_tags(&draft.tags),
        status: draft.status.unwrap_or_default(),
        view_count: 0,
        like_count: 0,
        comment_count: 0,
        is_featured: draft.is_featured.unwrap_or(false),
        created_at: now,
        updated_at: now,
    })
}
