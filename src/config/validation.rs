use crate::config::types::{ApiConfig, Config, CrawlerConfig, OutputConfig};
use crate::config::window::CrawlWindow;
use crate::model::Collection;
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_api_config(&config.api)?;
    validate_crawler_config(&config.crawler)?;
    validate_output_config(&config.output)?;
    validate_collections(&config.collections)?;
    Ok(())
}

/// Validates remote API configuration
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if config.token_env.trim().is_empty() {
        return Err(ConfigError::Validation(
            "token-env cannot be empty".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_seconds < 1 {
        return Err(ConfigError::Validation(
            "timeout-seconds must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates crawl behavior configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    CrawlWindow::parse(&config.start_date, &config.end_date)?;

    if config.per_page < 1 || config.per_page > 100 {
        return Err(ConfigError::Validation(format!(
            "per-page must be between 1 and 100, got {}",
            config.per_page
        )));
    }

    if config.max_retries < 1 || config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be between 1 and 10, got {}",
            config.max_retries
        )));
    }

    if config.backoff_seconds < 1 {
        return Err(ConfigError::Validation(format!(
            "backoff-seconds must be >= 1, got {}",
            config.backoff_seconds
        )));
    }

    if config.rate_limit_floor_seconds < 60 {
        return Err(ConfigError::Validation(format!(
            "rate-limit-floor-seconds must be >= 60, got {}",
            config.rate_limit_floor_seconds
        )));
    }

    if config.item_delay_ms < 300 {
        return Err(ConfigError::Validation(format!(
            "item-delay-ms must be >= 300ms, got {}ms",
            config.item_delay_ms
        )));
    }

    if config.max_concurrent_items < 1 || config.max_concurrent_items > 32 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-items must be between 1 and 32, got {}",
            config.max_concurrent_items
        )));
    }

    if config.max_pages == Some(0) {
        return Err(ConfigError::Validation(
            "max-pages must be >= 1 when set".to_string(),
        ));
    }

    if config.max_consecutive_skips < 1 {
        return Err(ConfigError::Validation(
            "max-consecutive-skips must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.data_dir.trim().is_empty() {
        return Err(ConfigError::Validation(
            "data-dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Rejects repeated collections; each one owns a single state directory
fn validate_collections(collections: &[Collection]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for collection in collections {
        if !seen.insert(collection.as_str()) {
            return Err(ConfigError::InvalidCollection(format!(
                "'{}' is listed more than once",
                collection
            )));
        }
    }
    Ok(())
}
