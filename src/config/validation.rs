use crate::config::types::{Config, CrawlerOptions, SelectorConfig, StorageConfig};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_seed_url(&config.source.base_url)?;
    validate_selectors(&config.source.selectors)?;
    validate_options(&config.crawler)?;
    validate_storage_config(&config.storage)?;
    Ok(())
}

/// Validates a seed URL and returns it parsed
///
/// The seed must be present and use HTTP or HTTPS.
pub fn validate_seed_url(seed: &str) -> Result<Url, ConfigError> {
    let seed = seed.trim();
    if seed.is_empty() {
        return Err(ConfigError::Missing("seed url".to_string()));
    }

    let url = Url::parse(seed)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "Seed URL '{}' must use HTTP or HTTPS",
            seed
        )));
    }

    Ok(url)
}

/// Validates per-run crawl options
pub fn validate_options(options: &CrawlerOptions) -> Result<(), ConfigError> {
    if options.max_concurrent < 1 || options.max_concurrent > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent must be between 1 and 100, got {}",
            options.max_concurrent
        )));
    }

    if options.user_agent.trim().is_empty() {
        return Err(ConfigError::Missing("user_agent".to_string()));
    }

    if options.timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "timeout_ms must be greater than zero".to_string(),
        ));
    }

    if options.pages_to_crawl < 1 {
        return Err(ConfigError::Validation(format!(
            "pages_to_crawl must be >= 1, got {}",
            options.pages_to_crawl
        )));
    }

    if options.max_articles < 1 {
        return Err(ConfigError::Validation(format!(
            "max_articles must be >= 1, got {}",
            options.max_articles
        )));
    }

    if !options.categories.is_empty() && !options.category_path.contains("{slug}") {
        return Err(ConfigError::Validation(format!(
            "category_path must contain '{{slug}}', got '{}'",
            options.category_path
        )));
    }

    if options.categories.iter().any(|c| c.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "category slugs cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates that every configured selector parses
fn validate_selectors(selectors: &SelectorConfig) -> Result<(), ConfigError> {
    let all = [
        ("listing-links", &selectors.listing_links),
        ("next-page", &selectors.next_page),
        ("title", &selectors.title),
        ("body", &selectors.body),
        ("excerpt", &selectors.excerpt),
        ("author", &selectors.author),
        ("published", &selectors.published),
        ("tags", &selectors.tags),
    ];

    for (name, selector) in all {
        Selector::parse(selector).map_err(|e| {
            ConfigError::Validation(format!("Invalid {} selector '{}': {:?}", name, selector, e))
        })?;
    }

    Ok(())
}

/// Validates storage configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}
