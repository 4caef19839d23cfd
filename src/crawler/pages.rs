//! Page-level fetching of the pull-request listing
//!
//! This module handles one list page at a time:
//! - Building the list URL for a collection and page number
//! - Fetching the page through the retry policy
//! - Filtering items by the creation window
//! - Fetching each retained item's commits, comments and review comments

use crate::config::{CrawlWindow, CrawlerConfig};
use crate::crawler::fetcher::{ApiClient, FetchError};
use crate::crawler::pacer::Pacer;
use crate::crawler::retry::{RetryError, RetryPolicy};
use crate::model::{Collection, PullRequest, SubResourceEntry, SubResourceKind, SubResourceSet};
use crate::ConfigError;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// A retained pull request together with its sub-resources
#[derive(Debug, Clone)]
pub struct FetchedItem {
    pub item: PullRequest,
    pub subresources: SubResourceSet,
}

/// Item counters for one page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageStats {
    /// Entries returned by the list call
    pub seen: usize,
    /// Entries created outside the window (dropped)
    pub out_of_window: usize,
    /// Entries that failed to parse (dropped)
    pub malformed: usize,
    /// Sub-resource lists that failed and were recorded as empty
    pub degraded_sub_resources: usize,
}

/// What happened to a page
#[derive(Debug)]
pub enum PageOutcome {
    /// Retained items in list order
    Items(Vec<FetchedItem>),
    /// Empty page: no more pages exist
    Exhausted,
    /// The list call failed; nothing was emitted for this page
    Skipped { reason: String },
}

/// Result of [`PageFetcher::fetch_page`]
#[derive(Debug)]
pub struct PageResult {
    pub page: u32,
    pub outcome: PageOutcome,
    pub stats: PageStats,
}

#[derive(Debug, Error)]
enum SubResourceError {
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Fetch(#[from] RetryError<FetchError>),

    #[error("response is not a JSON array")]
    NotAnArray,
}

/// Builds the list URL for a collection page
///
/// Results are requested oldest first over all states, so page numbers stay
/// stable while new pull requests are opened.
pub fn list_url(base: &Url, collection: &Collection, per_page: u32, page: u32) -> Url {
    let mut url = base.clone();

    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push("repos");
        segments.extend(collection.as_str().split('/'));
        segments.push("pulls");
    }

    url.query_pairs_mut()
        .clear()
        .append_pair("state", "all")
        .append_pair("sort", "created")
        .append_pair("direction", "asc")
        .append_pair("per_page", &per_page.to_string())
        .append_pair("page", &page.to_string());

    url
}

/// Parses an item's sub-resource URL and asks for full-size pages
fn sub_resource_url(raw: &str, per_page: u32) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(raw)?;
    if !url.query_pairs().any(|(key, _)| key == "per_page") {
        url.query_pairs_mut()
            .append_pair("per_page", &per_page.to_string());
    }
    Ok(url)
}

/// Fetches list pages and the sub-resources of their items
pub struct PageFetcher {
    client: ApiClient,
    retry: RetryPolicy,
    window: CrawlWindow,
    per_page: u32,
    concurrency: usize,
    pacer: Pacer,
}

impl PageFetcher {
    /// Creates a fetcher from the crawl settings
    ///
    /// # Returns
    ///
    /// * `Ok(PageFetcher)` - Ready to fetch
    /// * `Err(ConfigError)` - The date window is invalid
    pub fn new(client: ApiClient, config: &CrawlerConfig) -> Result<Self, ConfigError> {
        let window = CrawlWindow::parse(&config.start_date, &config.end_date)?;

        Ok(Self {
            client,
            retry: RetryPolicy::new(
                config.max_retries,
                Duration::from_secs(config.backoff_seconds),
            ),
            window,
            per_page: config.per_page,
            concurrency: config.max_concurrent_items.max(1) as usize,
            pacer: Pacer::new(Duration::from_millis(config.item_delay_ms)),
        })
    }

    /// Replaces the retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn window(&self) -> &CrawlWindow {
        &self.window
    }

    /// Fetches one page of a collection
    ///
    /// # Flow
    ///
    /// 1. GET the list URL through the retry policy; on failure the page is skipped
    /// 2. An empty list ends pagination
    /// 3. Items that fail to parse or fall outside the window are dropped and counted
    /// 4. Each retained item gets its three sub-resource lists; any list that
    ///    cannot be fetched is recorded as empty
    pub async fn fetch_page(&self, collection: &Collection, page: u32) -> PageResult {
        let url = list_url(self.client.base_url(), collection, self.per_page, page);
        let label = format!("{} page {}", collection, page);
        let mut stats = PageStats::default();

        let body = match self.retry.attempt(&label, || self.client.get(&url)).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("Failed to fetch {} after retries: {}. Skipping.", label, e);
                return PageResult {
                    page,
                    outcome: PageOutcome::Skipped {
                        reason: e.to_string(),
                    },
                    stats,
                };
            }
        };

        let entries = match body {
            Value::Array(entries) => entries,
            _ => {
                tracing::warn!("{}: list response is not a JSON array. Skipping.", label);
                return PageResult {
                    page,
                    outcome: PageOutcome::Skipped {
                        reason: "list response is not a JSON array".to_string(),
                    },
                    stats,
                };
            }
        };

        if entries.is_empty() {
            tracing::debug!("{} is empty, no more pages", label);
            return PageResult {
                page,
                outcome: PageOutcome::Exhausted,
                stats,
            };
        }

        stats.seen = entries.len();
        let retained = self.retain_in_window(entries, &label, &mut stats);

        let fetched: Vec<(FetchedItem, usize)> = stream::iter(retained)
            .map(|item| self.fetch_item(collection, item))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut items = Vec::with_capacity(fetched.len());
        for (item, degraded) in fetched {
            stats.degraded_sub_resources += degraded;
            items.push(item);
        }

        tracing::debug!(
            "{}: {} seen, {} retained, {} outside window, {} malformed",
            label,
            stats.seen,
            items.len(),
            stats.out_of_window,
            stats.malformed
        );

        PageResult {
            page,
            outcome: PageOutcome::Items(items),
            stats,
        }
    }

    fn retain_in_window(
        &self,
        entries: Vec<Value>,
        label: &str,
        stats: &mut PageStats,
    ) -> Vec<PullRequest> {
        let mut retained = Vec::with_capacity(entries.len());

        for entry in entries {
            let item: PullRequest = match serde_json::from_value(entry) {
                Ok(item) => item,
                Err(e) => {
                    tracing::warn!("{}: dropping malformed item: {}", label, e);
                    stats.malformed += 1;
                    continue;
                }
            };

            match item.created() {
                Some(created) if self.window.contains(created) => retained.push(item),
                Some(_) => stats.out_of_window += 1,
                None => {
                    tracing::warn!(
                        "{}: dropping PR #{} with unparsable created_at '{}'",
                        label,
                        item.number,
                        item.created_at
                    );
                    stats.malformed += 1;
                }
            }
        }

        retained
    }

    /// Fetches all sub-resources of one item; returns how many degraded to empty
    async fn fetch_item(&self, collection: &Collection, item: PullRequest) -> (FetchedItem, usize) {
        self.pacer.wait().await;

        let mut subresources = SubResourceSet::default();
        let mut degraded = 0;

        for kind in SubResourceKind::ALL {
            match self.fetch_sub_resource(&item, kind).await {
                Ok(entries) => subresources.set(kind, entries),
                Err(e) => {
                    degraded += 1;
                    tracing::warn!(
                        "{} PR #{}: {} unavailable ({}), recording empty list",
                        collection,
                        item.number,
                        kind.label(),
                        e
                    );
                }
            }
        }

        (FetchedItem { item, subresources }, degraded)
    }

    async fn fetch_sub_resource(
        &self,
        item: &PullRequest,
        kind: SubResourceKind,
    ) -> Result<Vec<SubResourceEntry>, SubResourceError> {
        let url = sub_resource_url(item.sub_resource_url(kind), self.per_page)?;
        let label = format!("PR #{} {}", item.number, kind.label());

        let body = self.retry.attempt(&label, || self.client.get(&url)).await?;

        match body {
            // Entries that do not match the expected shape are dropped one by one
            Value::Array(entries) => Ok(entries
                .into_iter()
                .filter_map(|entry| serde_json::from_value(entry).ok())
                .collect()),
            _ => Err(SubResourceError::NotAnArray),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_url() {
        let base = Url::parse("https://api.github.com").unwrap();
        let collection = Collection::parse("apache/spark").unwrap();

        let url = list_url(&base, &collection, 100, 3);
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/apache/spark/pulls?state=all&sort=created&direction=asc&per_page=100&page=3"
        );
    }

    #[test]
    fn test_list_url_keeps_base_path() {
        let base = Url::parse("https://ghe.example.com/api/v3/").unwrap();
        let collection = Collection::parse("team/tool").unwrap();

        let url = list_url(&base, &collection, 50, 1);
        assert_eq!(url.path(), "/api/v3/repos/team/tool/pulls");
    }

    #[test]
    fn test_sub_resource_url_adds_page_size_once() {
        let url = sub_resource_url("https://api.github.com/repos/a/b/pulls/1/commits", 100).unwrap();
        assert_eq!(url.query(), Some("per_page=100"));

        let url = sub_resource_url("https://api.github.com/x?per_page=30", 100).unwrap();
        assert_eq!(url.query(), Some("per_page=30"));

        assert!(sub_resource_url("not a url", 100).is_err());
    }
}
