//! Crawler module for the pull-request listing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with rate-limit handling and retry
//! - Page fetching, window filtering and sub-resource collection
//! - Record extraction
//! - Overall crawl coordination

mod coordinator;
mod extractor;
mod fetcher;
mod pacer;
mod pages;
mod retry;
mod summary;

pub use coordinator::{Coordinator, StopSignal, DEFAULT_MAX_CONSECUTIVE_SKIPS};
pub use extractor::extract_record;
pub use fetcher::{
    build_http_client, rate_limit_sleep, ApiClient, FetchError, DEFAULT_RATE_LIMIT_FLOOR,
    RATE_LIMIT_RESET_HEADER,
};
pub use pacer::Pacer;
pub use pages::{list_url, FetchedItem, PageFetcher, PageOutcome, PageResult, PageStats};
pub use retry::{Disposition, RetryError, RetryPolicy, Retryable};
pub use summary::{CollectionOutcome, CollectionSummary};
