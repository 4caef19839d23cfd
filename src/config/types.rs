use crate::model::Collection;
use serde::Deserialize;

/// Main configuration structure for the crawler
///
/// Every section is optional in the TOML file; missing keys fall back to the
/// defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub output: OutputConfig,
    /// Repositories to crawl, in order
    #[serde(default)]
    pub collections: Vec<Collection>,
}

/// Remote API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the REST API
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    /// Name of the environment variable holding the API token
    #[serde(rename = "token-env", default = "default_token_env")]
    pub token_env: String,

    /// User-Agent header sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-seconds", default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// Crawl behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// First day (or RFC 3339 instant) of the creation window, inclusive
    #[serde(rename = "start-date", default = "default_start_date")]
    pub start_date: String,

    /// Last day (or RFC 3339 instant) of the creation window, inclusive
    #[serde(rename = "end-date", default = "default_end_date")]
    pub end_date: String,

    /// Items requested per list page
    #[serde(rename = "per-page", default = "default_per_page")]
    pub per_page: u32,

    /// Attempts per logical fetch before giving up on transient errors
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Linear backoff unit; attempt n waits n times this long (seconds)
    #[serde(rename = "backoff-seconds", default = "default_backoff_seconds")]
    pub backoff_seconds: u64,

    /// Minimum sleep after a rate-limit response (seconds)
    #[serde(
        rename = "rate-limit-floor-seconds",
        default = "default_rate_limit_floor_seconds"
    )]
    pub rate_limit_floor_seconds: u64,

    /// Minimum spacing between item-level sub-resource fetches (milliseconds)
    #[serde(rename = "item-delay-ms", default = "default_item_delay_ms")]
    pub item_delay_ms: u64,

    /// Number of items whose sub-resources are fetched concurrently
    #[serde(rename = "max-concurrent-items", default = "default_max_concurrent_items")]
    pub max_concurrent_items: u32,

    /// Stop each collection after this many pages in one run
    #[serde(rename = "max-pages", default)]
    pub max_pages: Option<u32>,

    /// Give up on a collection after this many skipped pages in a row
    #[serde(
        rename = "max-consecutive-skips",
        default = "default_max_consecutive_skips"
    )]
    pub max_consecutive_skips: u32,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory holding one state directory per collection
    #[serde(rename = "data-dir", default = "default_data_dir")]
    pub data_dir: String,

    /// Write the CSV export after each collection's crawl
    #[serde(rename = "export-csv", default = "default_export_csv")]
    pub export_csv: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token_env: default_token_env(),
            user_agent: default_user_agent(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            start_date: default_start_date(),
            end_date: default_end_date(),
            per_page: default_per_page(),
            max_retries: default_max_retries(),
            backoff_seconds: default_backoff_seconds(),
            rate_limit_floor_seconds: default_rate_limit_floor_seconds(),
            item_delay_ms: default_item_delay_ms(),
            max_concurrent_items: default_max_concurrent_items(),
            max_pages: None,
            max_consecutive_skips: default_max_consecutive_skips(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            export_csv: default_export_csv(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

fn default_user_agent() -> String {
    format!("pr-crawler/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_start_date() -> String {
    "2018-01-01".to_string()
}

fn default_end_date() -> String {
    "2023-12-31".to_string()
}

fn default_per_page() -> u32 {
    100
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_seconds() -> u64 {
    10
}

fn default_rate_limit_floor_seconds() -> u64 {
    60
}

fn default_item_delay_ms() -> u64 {
    300
}

fn default_max_concurrent_items() -> u32 {
    4
}

fn default_max_consecutive_skips() -> u32 {
    10
}

fn default_data_dir() -> String {
    "data/raw".to_string()
}

fn default_export_csv() -> bool {
    true
}
