//! Article extraction
//!
//! Turns raw article markup into a normalized `ArticleDraft`:
//! - Canonical URL (page canonical link, else the fetched URL) plus an alias
//! - Title and publication time, both required
//! - Image selection with a markup fallback
//! - Summary, category slug, and deduplicated tags

use crate::article::{dedupe_tags, slugify, ArticleDraft};
use crate::crawler::parser::{collapse_whitespace, ListingPage, ParsedArticle, SourceStrategy};
use crate::url::normalize_url;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use scraper::Html;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use url::Url;

/// Why a page could not be turned into an article
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("Missing required field: {0}")]
    MissingRequiredField(&'static str),

    #[error("Parse failure: {0}")]
    ParseFailure(String),
}

/// Normalizes what a `SourceStrategy` reads into drafts
#[derive(Clone)]
pub struct Extractor {
    strategy: Arc<dyn SourceStrategy>,
}

impl Extractor {
    pub fn new(strategy: Arc<dyn SourceStrategy>) -> Self {
        Self { strategy }
    }

    /// Parses a listing page fetched from `page_url`
    pub fn parse_listing(&self, raw: &str, page_url: &str) -> Result<ListingPage, ExtractionError> {
        let page_url = parse_page_url(page_url)?;
        self.strategy.parse_listing(raw, &page_url)
    }

    /// Extracts an article draft from a page fetched from `source_url`
    ///
    /// Fails when the page has no title or no parseable publication time.
    pub fn extract(&self, raw: &str, source_url: &str) -> Result<ArticleDraft, ExtractionError> {
        let page_url = parse_page_url(source_url)?;
        let parsed = self.strategy.parse_article(raw, &page_url)?;
        build_draft(parsed, &page_url)
    }
}

fn parse_page_url(url: &str) -> Result<Url, ExtractionError> {
    Url::parse(url).map_err(|e| ExtractionError::ParseFailure(format!("{}: {}", url, e)))
}

fn build_draft(parsed: ParsedArticle, page_url: &Url) -> Result<ArticleDraft, ExtractionError> {
    let title = parsed
        .title
        .as_deref()
        .map(collapse_whitespace)
        .filter(|t| !t.is_empty())
        .ok_or(ExtractionError::MissingRequiredField("title"))?;

    let published_at = parsed
        .published
        .as_deref()
        .and_then(parse_published)
        .ok_or(ExtractionError::MissingRequiredField("published_at"))?;

    let fetched = canonical_string(page_url.as_str());
    let url = parsed
        .canonical_url
        .as_deref()
        .map(canonical_string)
        .unwrap_or_else(|| fetched.clone());

    let markup: Vec<&str> = [parsed.excerpt_html.as_deref(), parsed.body_html.as_deref()]
        .into_iter()
        .flatten()
        .collect();
    let image_url = resolve_image_url(parsed.image.as_deref(), &markup);

    let summary = parsed
        .excerpt_html
        .as_deref()
        .map(markup_text)
        .filter(|s| !s.is_empty())
        .or(parsed.description);

    let category = parsed
        .category
        .as_deref()
        .map(slugify)
        .filter(|c| !c.is_empty());

    let mut draft = ArticleDraft::new(url);
    if fetched != draft.url {
        draft.link = Some(fetched);
    }
    draft.title = Some(title);
    draft.content = parsed.body_text;
    draft.image_url = image_url;
    draft.published_at = Some(published_at);
    draft.category = category;
    draft.author = parsed
        .author
        .map(|a| collapse_whitespace(&a))
        .filter(|a| !a.is_empty());
    draft.summary = summary;
    draft.tags = dedupe_tags(parsed.tags);

    Ok(draft)
}

/// Normalized form of `url`, or the input unchanged if it does not parse
fn canonical_string(url: &str) -> String {
    normalize_url(url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

/// Picks the article image
///
/// A directly supplied image wins when it is a syntactically valid URL.
/// Otherwise each markup fragment is scanned in order and the last `<img src>`
/// of the first fragment containing any image is returned as written.
pub fn resolve_image_url(direct: Option<&str>, markup: &[&str]) -> Option<String> {
    if let Some(direct) = direct.map(str::trim).filter(|d| !d.is_empty()) {
        if Url::parse(direct).is_ok() {
            return Some(direct.to_string());
        }
    }

    markup.iter().find_map(|fragment| {
        image_src_pattern()
            .captures_iter(fragment)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().trim())
            .filter(|src| !src.is_empty())
            .last()
            .map(str::to_string)
    })
}

fn image_src_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)<img\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#)
            .expect("image pattern is a valid regex")
    })
}

/// Parses a publication time as written on a page
///
/// Accepts RFC 3339, RFC 2822, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS`
/// and bare dates; times without an offset are taken as UTC.
pub fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Plain text of an HTML fragment
fn markup_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    collapse_whitespace(&fragment.root_element().text().collect::<String>())
}
