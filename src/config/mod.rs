//! Configuration module for the crawler
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, the creation-date window, and the API token.
//!
//! # Example
//!
//! ```no_run
//! use pr_crawler::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawler.toml")).unwrap();
//! println!("Crawling {} collections", config.collections.len());
//! ```

mod credentials;
mod parser;
mod types;
mod validation;
mod window;

// Re-export types
pub use credentials::Credentials;
pub use types::{ApiConfig, Config, CrawlerConfig, OutputConfig};
pub use window::CrawlWindow;

// Re-export parser functions
pub use parser::{
    apply_env_overrides, compute_config_hash, load_config, load_config_with_hash, parse_config,
};
pub use validation::validate;
