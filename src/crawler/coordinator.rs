//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the page loop that ties the pieces together:
//! - Resuming each collection from its checkpoint
//! - Fetching pages and turning retained items into records
//! - Appending records, then advancing the checkpoint
//! - Recording skipped pages and honouring stop requests

use crate::config::{Config, Credentials};
use crate::crawler::extractor::extract_record;
use crate::crawler::fetcher::ApiClient;
use crate::crawler::pages::{FetchedItem, PageFetcher, PageOutcome};
use crate::crawler::summary::{CollectionOutcome, CollectionSummary};
use crate::model::Collection;
use crate::storage::{CheckpointStore, StorageResult};
use crate::CrawlError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Skipped pages in a row after which a collection is abandoned
pub const DEFAULT_MAX_CONSECUTIVE_SKIPS: u32 = 10;

/// Shared flag asking the crawl to stop at the next page boundary
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Main crawler coordinator structure
pub struct Coordinator<S: CheckpointStore> {
    fetcher: PageFetcher,
    store: S,
    stop: StopSignal,
    max_pages: Option<u32>,
    max_consecutive_skips: u32,
}

impl<S: CheckpointStore> Coordinator<S> {
    /// Creates a coordinator for the given configuration
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `credentials` - The API token
    /// * `store` - Where records and checkpoints are written
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(CrawlError)` - The HTTP client or date window could not be built
    pub fn new(config: &Config, credentials: &Credentials, store: S) -> Result<Self, CrawlError> {
        let client = ApiClient::new(&config.api, credentials)?.with_rate_limit_floor(
            Duration::from_secs(config.crawler.rate_limit_floor_seconds),
        );
        let fetcher = PageFetcher::new(client, &config.crawler)?;

        Ok(Self::with_fetcher(fetcher, store)
            .with_max_pages(config.crawler.max_pages)
            .with_max_consecutive_skips(config.crawler.max_consecutive_skips))
    }

    /// Creates a coordinator around an existing page fetcher
    pub fn with_fetcher(fetcher: PageFetcher, store: S) -> Self {
        Self {
            fetcher,
            store,
            stop: StopSignal::new(),
            max_pages: None,
            max_consecutive_skips: DEFAULT_MAX_CONSECUTIVE_SKIPS,
        }
    }

    /// Limits how many pages each collection fetches in one run
    pub fn with_max_pages(mut self, max_pages: Option<u32>) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Ends a collection after this many skipped pages in a row
    pub fn with_max_consecutive_skips(mut self, limit: u32) -> Self {
        self.max_consecutive_skips = limit.max(1);
        self
    }

    /// Handle that stops the crawl from another task
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Crawls each collection in turn, resuming from its checkpoint
    ///
    /// A storage failure ends only the affected collection; the others still
    /// run. Returns one summary per collection, in input order.
    pub async fn run(&mut self, collections: &[Collection]) -> Vec<CollectionSummary> {
        let mut summaries = Vec::with_capacity(collections.len());

        for collection in collections {
            if self.stop.is_stopped() {
                let mut summary = CollectionSummary::new(collection.clone());
                summary.outcome = CollectionOutcome::Interrupted;
                summaries.push(summary);
                continue;
            }

            let summary = self.crawl_collection(collection).await;
            summaries.push(summary);
        }

        summaries
    }

    /// Crawls one collection from its resume point until an empty page
    ///
    /// # Flow
    ///
    /// 1. Read the resume point from the checkpoint store
    /// 2. Fetch the page; an empty page ends the collection and is checkpointed,
    ///    unless it is the resume point itself (a rerun of a finished crawl)
    /// 3. A page that could not be fetched is recorded as skipped, the
    ///    checkpoint is left alone and the crawl moves on
    /// 4. Otherwise each retained item becomes a record, all records are
    ///    appended, and only then is the checkpoint advanced
    pub async fn crawl_collection(&mut self, collection: &Collection) -> CollectionSummary {
        let started = Instant::now();
        let mut summary = CollectionSummary::new(collection.clone());

        let mut page = match self.store.resume_point(collection) {
            Ok(page) => page,
            Err(e) => {
                tracing::error!("{}: cannot read checkpoint: {}", collection, e);
                summary.outcome = CollectionOutcome::Failed(e.to_string());
                summary.elapsed = started.elapsed();
                return summary;
            }
        };
        summary.start_page = page;

        if page > 1 {
            tracing::info!(
                "{}: resuming from page {} (pages up to {} are not fetched again)",
                collection,
                page,
                page - 1
            );
        } else {
            tracing::info!("{}: starting from page 1", collection);
        }

        let mut pages_fetched = 0u32;
        let mut consecutive_skips = 0u32;

        summary.outcome = loop {
            if self.stop.is_stopped() {
                tracing::info!("{}: stop requested before page {}", collection, page);
                break CollectionOutcome::Interrupted;
            }

            if self.max_pages.is_some_and(|max| pages_fetched >= max) {
                tracing::info!(
                    "{}: page limit reached, next run resumes at page {}",
                    collection,
                    page
                );
                break CollectionOutcome::PageLimit;
            }

            let result = self.fetcher.fetch_page(collection, page).await;
            pages_fetched += 1;
            summary.absorb(&result.stats);

            match result.outcome {
                PageOutcome::Exhausted => {
                    // the end was already checkpointed by an earlier run
                    if page == summary.start_page && page > 1 {
                        tracing::info!(
                            "{}: page {} is still empty, nothing new past page {}",
                            collection,
                            page,
                            page - 1
                        );
                        break CollectionOutcome::Completed;
                    }
                    if let Err(e) = self.store.advance(collection, page) {
                        break storage_failure(collection, page, e);
                    }
                    tracing::info!("{}: page {} is empty, collection complete", collection, page);
                    break CollectionOutcome::Completed;
                }
                PageOutcome::Skipped { reason } => {
                    tracing::warn!("{}: skipping page {}: {}", collection, page, reason);
                    if let Err(e) = self.store.mark_skipped(collection, page) {
                        break storage_failure(collection, page, e);
                    }
                    summary.skipped_pages.push(page);

                    consecutive_skips += 1;
                    if consecutive_skips >= self.max_consecutive_skips {
                        tracing::error!(
                            "{}: {} pages in a row failed, giving up until the next run",
                            collection,
                            consecutive_skips
                        );
                        break CollectionOutcome::SkipLimit;
                    }
                }
                PageOutcome::Items(items) => {
                    consecutive_skips = 0;
                    if let Err(e) = self.persist_page(collection, page, &items, &mut summary) {
                        break storage_failure(collection, page, e);
                    }
                    if let Err(e) = self.store.advance(collection, page) {
                        break storage_failure(collection, page, e);
                    }
                    summary.pages_completed += 1;
                    tracing::info!(
                        "{}: page {} done ({} records, {} total this run)",
                        collection,
                        page,
                        items.len(),
                        summary.records_written
                    );
                }
            }

            page += 1;
        };

        summary.elapsed = started.elapsed();
        summary
    }

    /// Fetches specific pages again without touching the checkpoint
    ///
    /// Used to recover pages recorded as skipped. A page that now succeeds
    /// has its records appended (already-logged pull requests are not
    /// duplicated) and is removed from the skipped list.
    pub async fn rerun_pages(&mut self, collection: &Collection, pages: &[u32]) -> CollectionSummary {
        let started = Instant::now();
        let mut summary = CollectionSummary::new(collection.clone());
        summary.start_page = pages.first().copied().unwrap_or(1);

        for &page in pages {
            if self.stop.is_stopped() {
                summary.outcome = CollectionOutcome::Interrupted;
                break;
            }

            let result = self.fetcher.fetch_page(collection, page).await;
            summary.absorb(&result.stats);

            let stored = match result.outcome {
                PageOutcome::Exhausted => {
                    tracing::info!("{}: page {} is empty", collection, page);
                    self.store.clear_skipped(collection, page)
                }
                PageOutcome::Skipped { reason } => {
                    tracing::warn!("{}: page {} still failing: {}", collection, page, reason);
                    summary.skipped_pages.push(page);
                    self.store.mark_skipped(collection, page)
                }
                PageOutcome::Items(items) => self
                    .persist_page(collection, page, &items, &mut summary)
                    .and_then(|()| self.store.clear_skipped(collection, page))
                    .map(|()| summary.pages_completed += 1),
            };

            if let Err(e) = stored {
                summary.outcome = storage_failure(collection, page, e);
                break;
            }
        }

        summary.elapsed = started.elapsed();
        summary
    }

    /// Re-fetches every page currently recorded as skipped
    pub async fn retry_skipped(&mut self, collection: &Collection) -> CollectionSummary {
        match self.store.skipped_pages(collection) {
            Ok(pages) if pages.is_empty() => {
                tracing::info!("{}: no skipped pages to retry", collection);
                CollectionSummary::new(collection.clone())
            }
            Ok(pages) => {
                tracing::info!("{}: retrying skipped pages {:?}", collection, pages);
                self.rerun_pages(collection, &pages).await
            }
            Err(e) => {
                let mut summary = CollectionSummary::new(collection.clone());
                summary.outcome = CollectionOutcome::Failed(e.to_string());
                summary
            }
        }
    }

    /// Appends one record per item, in list order
    fn persist_page(
        &mut self,
        collection: &Collection,
        page: u32,
        items: &[FetchedItem],
        summary: &mut CollectionSummary,
    ) -> StorageResult<()> {
        for fetched in items {
            let record = extract_record(&fetched.item, &fetched.subresources);
            if self.store.append(collection, &record)? {
                summary.records_written += 1;
            } else {
                tracing::debug!(
                    "{} page {}: PR #{} already recorded",
                    collection,
                    page,
                    record.pr_number
                );
                summary.duplicates_skipped += 1;
            }
        }
        Ok(())
    }
}

fn storage_failure(
    collection: &Collection,
    page: u32,
    error: crate::storage::StorageError,
) -> CollectionOutcome {
    tracing::error!(
        "{}: storage failure on page {}, stopping this collection: {}",
        collection,
        page,
        error
    );
    CollectionOutcome::Failed(error.to_string())
}
