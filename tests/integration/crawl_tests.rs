//! Integration tests for the crawler
//!
//! These tests use wiremock to serve a small news site and a temporary
//! SQLite database to test the full crawl cycle end-to-end.

use news_crawler::config::load_config;
use news_crawler::crawler::HtmlSourceStrategy;
use news_crawler::state::ErrorKind;
use news_crawler::storage::{ArticleStore, SqliteArticleStore};
use news_crawler::{CrawlError, CrawlStatus, Crawler, CrawlerOptions};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Options suited to a local mock server
fn test_options() -> CrawlerOptions {
    CrawlerOptions {
        max_concurrent: 3,
        delay_ms: 0,
        max_retries: 0,
        timeout_ms: 2_000,
        user_agent: "TestBot/1.0".to_string(),
        ..CrawlerOptions::default()
    }
}

fn create_crawler(dir: &TempDir) -> Crawler {
    let store = SqliteArticleStore::new(&dir.path().join("articles.db"))
        .expect("Failed to open test database");
    Crawler::new(store).expect("Failed to create crawler")
}

fn listing_html(links: &[&str]) -> String {
    let items: String = links
        .iter()
        .map(|l| format!(r#"<article><h2 class="entry-title"><a href="{}">Story</a></h2></article>"#, l))
        .collect();
    format!("<html><head><title>Latest</title></head><body>{}</body></html>", items)
}

async fn mount_html(server: &MockServer, at: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

const BUDGET_ARTICLE: &str = r#"<html><head>
    <meta property="og:title" content="Council approves budget">
    <meta property="og:image" content="https://cdn.example.com/budget.jpg">
    <meta property="article:published_time" content="2024-05-01T08:30:00Z">
    <meta property="article:section" content="Politics">
    <meta property="article:tag" content="Budget">
    <meta name="author" content="Jane Reporter">
</head><body>
    <div class="entry-content"><p>The council voted on Tuesday.</p></div>
</body></html>"#;

const STORM_ARTICLE: &str = r#"<html><head><title>Storm closes schools</title></head><body>
    <article>
        <h1 class="entry-title">Storm closes schools</h1>
        <time datetime="2024-05-02 06:00:00">May 2</time>
        <div class="excerpt"><p><img src="a.jpg"> Snow <img src="b.jpg"></p></div>
        <div class="entry-content"><p>Schools are closed.</p></div>
    </article>
</body></html>"#;

#[tokio::test]
async fn test_full_crawl_persists_articles() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_html(&server, "/news/", listing_html(&["/news/budget/", "/news/storm/"])).await;
    mount_html(&server, "/news/budget/", BUDGET_ARTICLE.to_string()).await;
    mount_html(&server, "/news/storm/", STORM_ARTICLE.to_string()).await;

    let dir = TempDir::new().unwrap();
    let crawler = create_crawler(&dir);

    let saved = crawler
        .start(&format!("{}/news/", base), test_options())
        .await
        .expect("Crawl failed");
    assert_eq!(saved.len(), 2);

    let stats = crawler.stats();
    assert_eq!(stats.status, CrawlStatus::Stopped);
    assert_eq!(stats.pages_crawled, 1);
    assert_eq!(stats.urls_discovered, 2);
    assert_eq!(stats.articles_saved, 2);
    assert_eq!(stats.success, 2);
    assert_eq!(stats.failed, 0);
    assert!(stats.is_consistent());

    let store = crawler.store();
    let store = store.lock().unwrap();
    assert_eq!(store.count_articles().unwrap(), 2);

    let budget = store
        .find_by_url(&format!("{}/news/budget/", base))
        .unwrap()
        .expect("budget article stored");
    assert_eq!(budget.article.title, "Council approves budget");
    assert_eq!(budget.article.category, "politics");
    assert_eq!(budget.article.author.as_deref(), Some("Jane Reporter"));
    assert_eq!(
        budget.article.image_url.as_deref(),
        Some("https://cdn.example.com/budget.jpg")
    );
    assert_eq!(budget.article.tags, vec!["Budget"]);
    assert_eq!(budget.article.content, "The council voted on Tuesday.");

    let storm = store
        .find_by_url(&format!("{}/news/storm/", base))
        .unwrap()
        .expect("storm article stored");
    assert_eq!(storm.article.image_url.as_deref(), Some("b.jpg"));
    assert_eq!(storm.article.category, "uncategorized");
    assert_eq!(storm.article.summary.as_deref(), Some("Snow"));

    let run = store.get_latest_run().unwrap().expect("run recorded");
    assert_eq!(run.status, CrawlStatus::Stopped);
    assert!(run.finished_at.is_some());
}

#[tokio::test]
async fn test_rerun_updates_existing_articles() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_html(&server, "/", listing_html(&["/budget/"])).await;
    mount_html(&server, "/budget/", BUDGET_ARTICLE.to_string()).await;

    let dir = TempDir::new().unwrap();
    let crawler = create_crawler(&dir);
    let seed = format!("{}/", base);

    let first = crawler.start(&seed, test_options()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = crawler.start(&seed, test_options()).await.unwrap();

    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_eq!(first[0].id, second[0].id);

    let store = crawler.store();
    let store = store.lock().unwrap();
    assert_eq!(store.count_articles().unwrap(), 1);

    let stored = store.get_article(first[0].id).unwrap();
    assert_eq!(stored.article.created_at, first[0].article.created_at);
    assert!(stored.article.updated_at > first[0].article.updated_at);
}

#[tokio::test]
async fn test_failing_article_is_counted_and_retried() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_html(&server, "/", listing_html(&["/budget/", "/broken/"])).await;
    mount_html(&server, "/budget/", BUDGET_ARTICLE.to_string()).await;

    // One initial attempt plus one retry
    Mock::given(method("GET"))
        .and(path("/broken/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let crawler = create_crawler(&dir);

    let options = CrawlerOptions {
        max_retries: 1,
        ..test_options()
    };
    let saved = crawler.start(&format!("{}/", base), options).await.unwrap();

    assert_eq!(saved.len(), 1);
    let stats = crawler.stats();
    assert_eq!(stats.total_crawled, 2);
    assert_eq!(stats.success, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.retries, 1);
    assert_eq!(stats.errors.len(), 1);
    assert_eq!(stats.errors[0].kind, ErrorKind::Fetch);
    assert!(stats.errors[0].url.ends_with("/broken/"));
}

#[tokio::test]
async fn test_unreachable_seed_fails_run() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let crawler = create_crawler(&dir);

    let err = crawler
        .start(&format!("{}/", server.uri()), test_options())
        .await
        .unwrap_err();
    assert!(matches!(err, CrawlError::SeedUnreachable { .. }));

    let stats = crawler.stats();
    assert_eq!(stats.status, CrawlStatus::Error);
    assert_eq!(stats.total_crawled, 0);

    let store = crawler.store();
    let run = store.lock().unwrap().get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, CrawlStatus::Error);
}

#[tokio::test]
async fn test_canonical_link_rekeys_article_on_later_run() {
    let server = MockServer::start().await;
    let base = server.uri();

    // First crawl: the article has no canonical link yet
    mount_html(&server, "/", listing_html(&["/story/"])).await;
    mount_html(
        &server,
        "/story/",
        r#"<html><head><meta property="og:title" content="Draft headline">
           <meta property="article:published_time" content="2024-05-03T10:00:00Z"></head>
           <body><div class="entry-content"><p>Original body</p></div></body></html>"#
            .to_string(),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let crawler = create_crawler(&dir);
    let seed = format!("{}/", base);
    let first = crawler.start(&seed, test_options()).await.unwrap();

    // Second crawl: the page now declares a canonical URL and a new headline
    server.reset().await;
    mount_html(&server, "/", listing_html(&["/story/"])).await;
    mount_html(
        &server,
        "/story/",
        format!(
            r#"<html><head><meta property="og:title" content="Final headline">
               <link rel="canonical" href="{}/2024/05/final-story/"></head>
               <body><time datetime="2024-05-03">May 3</time></body></html>"#,
            base
        ),
    )
    .await;
    let second = crawler.start(&seed, test_options()).await.unwrap();

    assert_eq!(first[0].id, second[0].id);

    let store = crawler.store();
    let store = store.lock().unwrap();
    assert_eq!(store.count_articles().unwrap(), 1);
    assert!(store.find_by_url(&format!("{}/story/", base)).unwrap().is_none());

    let moved = store
        .find_by_url(&format!("{}/2024/05/final-story/", base))
        .unwrap()
        .expect("article re-keyed to canonical URL");
    assert_eq!(moved.article.title, "Final headline");
    // The second page had no body paragraphs, so the stored body survives
    assert_eq!(moved.article.content, "Original body");
}

#[tokio::test]
async fn test_crawl_from_config_file() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_html(
        &server,
        "/",
        r#"<html><body><ul class="river">
            <li><a class="headline" href="/one/">One</a></li>
            <li><a class="headline" href="/two/">Two</a></li>
            <li><a class="headline" href="/three/">Three</a></li>
        </ul><a class="older" href="/page/2/">Older</a></body></html>"#
            .to_string(),
    )
    .await;
    mount_html(
        &server,
        "/page/2/",
        r#"<html><body><ul class="river"><li><a class="headline" href="/four/">Four</a></li></ul></body></html>"#
            .to_string(),
    )
    .await;
    for slug in ["one", "two", "three", "four"] {
        mount_html(
            &server,
            &format!("/{}/", slug),
            format!(
                r#"<html><body><h2 class="hed">Story {}</h2>
                   <span class="dateline">2024-04-30</span>
                   <div class="story-body"><p>Text</p></div></body></html>"#,
                slug
            ),
        )
        .await;
    }

    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("crawler.toml");
    std::fs::write(
        &config_path,
        format!(
            r#"
[source]
base-url = "{base}/"

[source.selectors]
listing-links = "ul.river a.headline"
next-page = "a.older"
title = "h2.hed"
body = ".story-body"
published = ".dateline"

[crawler]
max-concurrent = 2
delay-ms = 5
pages-to-crawl = 2
max-articles = 3
user-agent = "TestBot/1.0"

[storage]
database-path = "{db}"
"#,
            base = base,
            db = dir.path().join("articles.db").display()
        ),
    )
    .unwrap();

    let config = load_config(&config_path).expect("Failed to load config");
    let store = SqliteArticleStore::new(std::path::Path::new(&config.storage.database_path)).unwrap();
    let crawler = Crawler::new(store)
        .unwrap()
        .with_strategy(Arc::new(HtmlSourceStrategy::new(config.source.selectors.clone())));

    let saved = crawler
        .start(&config.source.base_url, config.crawler.clone())
        .await
        .unwrap();

    // max-articles stops discovery before the second listing page
    assert_eq!(saved.len(), 3);
    let stats = crawler.stats();
    assert_eq!(stats.pages_crawled, 1);
    assert_eq!(stats.urls_discovered, 3);

    let mut titles: Vec<String> = saved.into_iter().map(|a| a.article.title).collect();
    titles.sort();
    assert_eq!(titles, vec!["Story one", "Story three", "Story two"]);
}

#[tokio::test]
async fn test_stop_from_another_task() {
    let server = MockServer::start().await;
    let base = server.uri();

    let links: Vec<String> = (1..=8).map(|i| format!("/slow-{}/", i)).collect();
    let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();
    mount_html(&server, "/", listing_html(&link_refs)).await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/slow-\d+/$"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(BUDGET_ARTICLE)
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let crawler = Arc::new(create_crawler(&dir));

    let options = CrawlerOptions {
        max_concurrent: 2,
        ..test_options()
    };
    let run = tokio::spawn({
        let crawler = crawler.clone();
        let seed = format!("{}/", base);
        async move { crawler.start(&seed, options).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    crawler.stop().await;

    let saved = run.await.unwrap().unwrap();
    let stats = crawler.stats();

    assert_eq!(stats.status, CrawlStatus::Stopped);
    assert!(stats.total_crawled < 8);
    assert_eq!(stats.success + stats.failed, stats.total_crawled);
    assert!(stats.is_consistent());

    // Every article dispatched before the stop was written
    assert!(stats.articles_saved >= 1);
    assert_eq!(saved.len() as u64, stats.articles_saved);
    let store = crawler.store();
    assert_eq!(
        store.lock().unwrap().count_articles().unwrap(),
        stats.articles_saved
    );
}
