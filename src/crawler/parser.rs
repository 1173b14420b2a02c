//! HTML parsing for listing and article pages
//!
//! This module handles the source-specific half of extraction:
//! - Listing pages: article links and the next-page link
//! - Article pages: raw field values from meta tags and configured selectors
//!
//! Values come back raw; `Extractor` turns them into an `ArticleDraft`.

use crate::config::SelectorConfig;
use crate::crawler::extractor::ExtractionError;
use crate::url::same_site;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Article links and pagination found on one listing page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingPage {
    /// Absolute article URLs, in page order, without duplicates
    pub article_urls: Vec<String>,

    /// Absolute URL of the next listing page, if any
    pub next_page: Option<String>,
}

/// Raw field values read from an article page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedArticle {
    /// `<link rel="canonical">`, resolved against the page URL
    pub canonical_url: Option<String>,
    pub title: Option<String>,
    /// Body as plain text, paragraphs separated by blank lines
    pub body_text: Option<String>,
    /// Body markup
    pub body_html: Option<String>,
    /// Excerpt markup
    pub excerpt_html: Option<String>,
    /// Meta description
    pub description: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    /// Publication time exactly as written on the page
    pub published: Option<String>,
    /// Image URL from `og:image`/`twitter:image`, unvalidated
    pub image: Option<String>,
    pub tags: Vec<String>,
}

/// Source-specific listing and article parsing
pub trait SourceStrategy: Send + Sync {
    fn parse_listing(&self, html: &str, page_url: &Url) -> Result<ListingPage, ExtractionError>;

    fn parse_article(&self, html: &str, page_url: &Url)
        -> Result<ParsedArticle, ExtractionError>;
}

/// Strategy for conventional news/blog markup driven by CSS selectors
#[derive(Debug, Clone, Default)]
pub struct HtmlSourceStrategy {
    selectors: SelectorConfig,
}

impl HtmlSourceStrategy {
    pub fn new(selectors: SelectorConfig) -> Self {
        Self { selectors }
    }
}

impl SourceStrategy for HtmlSourceStrategy {
    /// Collects article links from a listing page
    ///
    /// # Link Extraction Rules
    ///
    /// **Include:**
    /// - Anchors matched by the `listing-links` selector on the same site
    ///
    /// **Exclude:**
    /// - `javascript:`, `mailto:`, `tel:` links and data URIs
    /// - Fragment-only links and the listing page itself
    /// - Links to other sites
    fn parse_listing(&self, html: &str, page_url: &Url) -> Result<ListingPage, ExtractionError> {
        let document = Html::parse_document(html);
        let links = compile(&self.selectors.listing_links)?;

        let mut seen = HashSet::new();
        let mut article_urls = Vec::new();

        for element in document.select(&links) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let Some(absolute) = resolve_link(href, page_url) else {
                continue;
            };
            if !same_site(&absolute, page_url) || strip_fragment(&absolute) == strip_fragment(page_url) {
                continue;
            }

            let absolute = absolute.to_string();
            if seen.insert(absolute.clone()) {
                article_urls.push(absolute);
            }
        }

        let next_page = first_attr(&document, &self.selectors.next_page, "href")
            .and_then(|href| resolve_link(&href, page_url))
            .filter(|next| same_site(next, page_url) && strip_fragment(next) != strip_fragment(page_url))
            .map(|next| next.to_string());

        Ok(ListingPage {
            article_urls,
            next_page,
        })
    }

    fn parse_article(
        &self,
        html: &str,
        page_url: &Url,
    ) -> Result<ParsedArticle, ExtractionError> {
        let document = Html::parse_document(html);
        let selectors = &self.selectors;

        let canonical_url = first_attr(&document, "link[rel='canonical'][href]", "href")
            .and_then(|href| resolve_link(&href, page_url))
            .map(|u| u.to_string());

        let title = meta_content(&document, &["og:title", "twitter:title"])
            .or_else(|| first_text(&document, &selectors.title))
            .or_else(|| first_text(&document, "title"));

        let body = first_element(&document, &selectors.body);
        let body_html = body.map(|el| el.inner_html());
        let body_text = body.and_then(paragraph_text);

        let excerpt_html = first_element(&document, &selectors.excerpt).map(|el| el.inner_html());

        let description = meta_content(&document, &["description", "og:description"]);

        let author = meta_content(&document, &["author", "article:author"])
            .filter(|a| !a.starts_with("http"))
            .or_else(|| first_text(&document, &selectors.author));

        let category = meta_content(&document, &["article:section"]);

        let published = meta_content(&document, &["article:published_time", "datePublished"])
            .or_else(|| first_attr(&document, &selectors.published, "datetime"))
            .or_else(|| first_text(&document, &selectors.published));

        let image = meta_content(&document, &["og:image", "twitter:image"]);

        let mut tags = meta_contents(&document, "article:tag");
        if let Ok(tag_selector) = Selector::parse(&selectors.tags) {
            tags.extend(document.select(&tag_selector).filter_map(element_text));
        }

        Ok(ParsedArticle {
            canonical_url,
            title,
            body_text,
            body_html,
            excerpt_html,
            description,
            author,
            category,
            published,
            image,
            tags,
        })
    }
}

fn compile(selector: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(selector)
        .map_err(|e| ExtractionError::ParseFailure(format!("invalid selector '{}': {}", selector, e)))
}

/// Splits a selector group into its alternatives, in priority order
///
/// `document.select` yields matches in document order, so a group like
/// `h1.entry-title, h1` would pick whichever comes first on the page.
fn alternatives(group: &str) -> Vec<Selector> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote = None;
    let mut start = 0;

    for (i, c) in group.char_indices() {
        match (quote, c) {
            (Some(q), _) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '(' | '[') => depth += 1,
            (None, ')' | ']') => depth -= 1,
            (None, ',') if depth == 0 => {
                parts.push(&group[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&group[start..]);

    parts
        .into_iter()
        .filter_map(|part| Selector::parse(part.trim()).ok())
        .collect()
}

fn first_element<'a>(document: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    alternatives(selector)
        .iter()
        .find_map(|s| document.select(s).next())
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    alternatives(selector)
        .iter()
        .find_map(|s| document.select(s).find_map(element_text))
}

fn first_attr(document: &Html, selector: &str, attr: &str) -> Option<String> {
    alternatives(selector).iter().find_map(|s| {
        document
            .select(s)
            .filter_map(|el| el.value().attr(attr))
            .map(str::trim)
            .find(|v| !v.is_empty())
            .map(str::to_string)
    })
}

/// Text content with whitespace runs collapsed
fn element_text(element: ElementRef<'_>) -> Option<String> {
    let text = collapse_whitespace(&element.text().collect::<String>());
    (!text.is_empty()).then_some(text)
}

/// Trims and collapses whitespace runs to single spaces
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Paragraph text of the body, falling back to all of its text
fn paragraph_text(body: ElementRef<'_>) -> Option<String> {
    let paragraphs: Vec<String> = Selector::parse("p")
        .map(|p| body.select(&p).filter_map(element_text).collect())
        .unwrap_or_default();

    if paragraphs.is_empty() {
        element_text(body)
    } else {
        Some(paragraphs.join("\n\n"))
    }
}

/// First non-empty `content` of a meta tag matched by `property` or `name`
fn meta_content(document: &Html, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| meta_contents(document, key).into_iter().next())
}

fn meta_contents(document: &Html, key: &str) -> Vec<String> {
    let query = format!(
        "meta[property='{key}'][content], meta[name='{key}'][content], meta[itemprop='{key}'][content]"
    );
    let Ok(selector) = Selector::parse(&query) else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|el| el.value().attr("content"))
        .map(collapse_whitespace)
        .filter(|v| !v.is_empty())
        .collect()
}

fn strip_fragment(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);
    url
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only links
/// - Non-HTTP(S) URLs after resolution
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    base_url
        .join(href)
        .ok()
        .filter(|u| u.scheme() == "http" || u.scheme() == "https")
}
