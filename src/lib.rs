//! pr-crawler: a resumable pull-request harvester
//!
//! This crate crawls the paginated pull-request listing of one or more
//! repositories, fetches each pull request's commits, comments and review
//! comments, and writes one flattened record per pull request to an
//! append-only log that survives interruption and resumes page by page.

pub mod config;
pub mod crawler;
pub mod model;
pub mod output;
pub mod storage;

use thiserror::Error;

/// Main error type for crawl operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid collection identifier: {0}")]
    InvalidCollection(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Missing API token: set the {0} environment variable")]
    MissingToken(String),
}

// Re-export commonly used types
pub use config::{Config, Credentials};
pub use crawler::{CollectionOutcome, CollectionSummary, Coordinator};
pub use model::{Collection, Record};
pub use storage::{CheckpointStore, FileCheckpointStore};
