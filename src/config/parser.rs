use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Environment variable overriding `crawler.start-date`
pub const START_DATE_ENV: &str = "START_DATE";

/// Environment variable overriding `crawler.end-date`
pub const END_DATE_ENV: &str = "END_DATE";

/// Parses configuration from TOML text without validating it
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use pr_crawler::config::load_config;
///
/// let config = load_config(Path::new("crawler.toml")).unwrap();
/// println!("Window: {} .. {}", config.crawler.start_date, config.crawler.end_date);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so runs made with different settings can be told apart.
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

/// Applies `START_DATE` / `END_DATE` overrides to the crawl window
///
/// `lookup` resolves a variable name to its value; `main` passes the
/// process environment. Returns true if anything changed, in which case the
/// caller should validate again.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    let mut changed = false;

    if let Some(start) = lookup(START_DATE_ENV).filter(|v| !v.trim().is_empty()) {
        config.crawler.start_date = start.trim().to_string();
        changed = true;
    }

    if let Some(end) = lookup(END_DATE_ENV).filter(|v| !v.trim().is_empty()) {
        config.crawler.end_date = end.trim().to_string();
        changed = true;
    }

    changed
}
