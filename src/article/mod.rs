//! Article records
//!
//! - `ArticleDraft`: what the extractor produces; every field except `url` may be absent
//! - `Article`: the strict persisted schema with explicit defaults
//! - `StoredArticle`: an `Article` plus the id assigned by the store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Category assigned when neither the page nor the listing names one
pub const DEFAULT_CATEGORY: &str = "uncategorized";

/// Publication status of an article
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    #[default]
    Published,
    Draft,
    Deleted,
}

impl ArticleStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Published => "published",
            Self::Draft => "draft",
            Self::Deleted => "deleted",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "published" => Some(Self::Published),
            "draft" => Some(Self::Draft),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

impl fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// A normalized article as persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub content: String,
    /// Canonical URL, unique across the store
    pub url: String,
    pub image_url: Option<String>,
    pub published_at: DateTime<Utc>,
    /// Category slug
    pub category: String,
    pub author: Option<String>,
    pub summary: Option<String>,
    /// Ordered, de-duplicated tag list
    pub tags: Vec<String>,
    pub status: ArticleStatus,
    pub view_count: u64,
    pub like_count: u64,
    pub comment_count: u64,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An article together with its store-assigned id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredArticle {
    pub id: i64,
    #[serde(flatten)]
    pub article: Article,
}

/// Candidate article fields produced by extraction
///
/// Legacy field names (`link` for `url`, `image` for `image_url`, `excerpt`
/// for `summary`) are accepted when deserializing and never carried further.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleDraft {
    #[serde(alias = "link")]
    pub url: String,

    /// Secondary URL the same article is known by (e.g. the fetched URL
    /// when the page declares a different canonical)
    #[serde(skip)]
    pub link: Option<String>,

    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, alias = "image")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default, alias = "excerpt")]
    pub summary: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: Option<ArticleStatus>,
    #[serde(default)]
    pub is_featured: Option<bool>,
}

impl ArticleDraft {
    /// Creates an empty draft for a URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

/// Returns the trimmed value if it is present and non-empty
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Turns a category name into a slug (`"World News"` -> `"world-news"`)
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Trims tags, drops empty ones and removes case-insensitive duplicates,
/// keeping the first spelling in its original position
pub fn dedupe_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for tag in tags {
        let tag = tag.as_ref().trim();
        if tag.is_empty() {
            continue;
        }
        if seen.insert(tag.to_lowercase()) {
            out.push(tag.to_string());
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_db_strings() {
        assert_eq!(ArticleStatus::Draft.to_db_string(), "draft");
        assert_eq!(
            ArticleStatus::from_db_string("deleted"),
            Some(ArticleStatus::Deleted)
        );
        assert_eq!(ArticleStatus::from_db_string("archived"), None);
        assert_eq!(ArticleStatus::default(), ArticleStatus::Published);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("World News"), "world-news");
        assert_eq!(slugify("  Sci & Tech  "), "sci-tech");
        assert_eq!(slugify("already-a-slug"), "already-a-slug");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_dedupe_tags_keeps_first_spelling_and_order() {
        let tags = dedupe_tags(["Economy", " politics ", "economy", "", "Elections"]);
        assert_eq!(tags, vec!["Economy", "politics", "Elections"]);
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(&Some("  x ".to_string())), Some("x"));
        assert_eq!(non_empty(&Some("   ".to_string())), None);
        assert_eq!(non_empty(&None), None);
    }

    #[test]
    fn test_draft_accepts_legacy_aliases() {
        let json = r#"{
            "link": "https://news.example.com/a",
            "title": "Headline",
            "image": "https://cdn.example.com/a.jpg",
            "excerpt": "Short"
        }"#;
        let draft: ArticleDraft = serde_json::from_str(json).unwrap();

        assert_eq!(draft.url, "https://news.example.com/a");
        assert_eq!(
            draft.image_url.as_deref(),
            Some("https://cdn.example.com/a.jpg")
        );
        assert_eq!(draft.summary.as_deref(), Some("Short"));
        assert!(draft.link.is_none());
        assert!(draft.tags.is_empty());
    }

    #[test]
    fn test_stored_article_serializes_flat() {
        let now = Utc::now();
        let stored = StoredArticle {
            id: 7,
            article: Article {
                title: "T".to_string(),
                content: String::new(),
                url: "https://news.example.com/t".to_string(),
                image_url: None,
                published_at: now,
                category: DEFAULT_CATEGORY.to_string(),
                author: None,
                summary: None,
                tags: vec![],
                status: ArticleStatus::Published,
                view_count: 0,
                like_count: 0,
                comment_count: 0,
                is_featured: false,
                created_at: now,
                updated_at: now,
            },
        };

        let value = serde_json::to_value(&stored).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["url"], "https://news.example.com/t");
        assert_eq!(value["status"], "published");
    }
}
