//! News crawler main entry point
//!
//! This is the command-line interface for crawling a news source into a
//! local SQLite article database.

use anyhow::Context;
use clap::Parser;
use news_crawler::config::{load_config_with_hash, validate_seed_url, Config};
use news_crawler::crawler::{listing_roots, Crawler, HtmlSourceStrategy};
use news_crawler::output::{format_statistics, load_last_run, print_statistics, stats_to_json};
use news_crawler::storage::open_storage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// News crawler: crawls a news site into a deduplicated article store
///
/// Listing pages are walked from the configured source URL (and any
/// configured categories); each article is extracted and upserted by its
/// canonical URL, so repeated runs update rather than duplicate.
#[derive(Parser, Debug)]
#[command(name = "news-crawler")]
#[command(version)]
#[command(about = "Crawl a news site into a local article store", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Listing URL to start from instead of the configured base URL
    #[arg(long, value_name = "URL")]
    seed: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Print final statistics as JSON
    #[arg(long)]
    json: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show the last recorded run from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if let Some(seed) = cli.seed {
        config.source.base_url = seed;
    }

    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.stats {
        handle_stats(&config, cli.json)
    } else {
        handle_crawl(config, cli.json).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// `RUST_LOG`, when set, overrides the verbosity flags.
fn setup_logging(verbose: u8, quiet: bool) {
    let default_filter = if quiet {
        "error"
    } else {
        match verbose {
            0 => "news_crawler=info,warn",
            1 => "news_crawler=debug,info",
            2 => "news_crawler=trace,debug",
            _ => "trace",
        }
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    let seed = validate_seed_url(&config.source.base_url)?;
    let options = &config.crawler;

    println!("=== News Crawler Dry Run ===\n");

    println!("Source:");
    println!("  Base URL: {}", seed);
    println!("  Article links: {}", config.source.selectors.listing_links);
    println!("  Next page: {}", config.source.selectors.next_page);

    println!("\nCrawler Options:");
    println!("  Max concurrent: {}", options.max_concurrent);
    println!("  Delay between dispatches: {}ms", options.delay_ms);
    println!("  Timeout: {}ms", options.timeout_ms);
    println!("  Max retries: {}", options.max_retries);
    println!("  Pages per listing: {}", options.pages_to_crawl);
    println!("  Max articles: {}", options.max_articles);
    println!("  User agent: {}", options.user_agent);
    println!("  Options fingerprint: {}", options.fingerprint());

    let roots = listing_roots(&seed, options);
    println!("\nListing Roots ({}):", roots.len());
    for root in &roots {
        match &root.category {
            Some(category) => println!("  - {} [{}]", root.url, category),
            None => println!("  - {}", root.url),
        }
    }

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path);

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the --stats mode: shows the last run recorded in the database
fn handle_stats(config: &Config, json: bool) -> anyhow::Result<()> {
    let store = open_storage(Path::new(&config.storage.database_path))?;

    let Some(report) = load_last_run(&store)? else {
        println!("No crawl runs found in {}", config.storage.database_path);
        return Ok(());
    };

    match (&report.stats, json) {
        (Some(stats), true) => println!("{}", stats_to_json(stats)?),
        (Some(stats), false) => {
            println!("Database: {}", config.storage.database_path);
            println!("Run {} (options {})", report.run.id, report.run.options_fingerprint);
            println!("Articles stored: {}\n", report.total_articles);
            print!("{}", format_statistics(stats));
        }
        (None, _) => println!(
            "Run {} started at {} has not finished (status: {})",
            report.run.id,
            report.run.started_at.to_rfc3339(),
            report.run.status
        ),
    }

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, json: bool) -> anyhow::Result<()> {
    let store = open_storage(Path::new(&config.storage.database_path))
        .with_context(|| format!("Failed to open {}", config.storage.database_path))?;

    let strategy = Arc::new(HtmlSourceStrategy::new(config.source.selectors.clone()));
    let crawler = Arc::new(Crawler::new(store)?.with_strategy(strategy));

    // Ctrl-C stops gracefully: in-flight articles are still written
    let interrupt = {
        let crawler = crawler.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, finishing in-flight articles");
                crawler.stop().await;
            }
        })
    };

    let result = crawler
        .start(&config.source.base_url, config.crawler.clone())
        .await;
    interrupt.abort();

    let stats = crawler.stats();
    if json {
        println!("{}", stats_to_json(&stats)?);
    } else {
        print_statistics(&stats);
    }

    let saved = result?;
    tracing::info!("{} articles written to {}", saved.len(), config.storage.database_path);
    Ok(())
}
