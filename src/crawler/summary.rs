use crate::crawler::pages::PageStats;
use crate::model::Collection;
use std::time::Duration;

/// How a collection's crawl ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionOutcome {
    /// An empty page was reached
    Completed,
    /// The operator asked the crawl to stop
    Interrupted,
    /// The per-run page limit was reached
    PageLimit,
    /// Too many pages in a row could not be fetched
    SkipLimit,
    /// A storage error stopped the crawl; state on disk is still consistent
    Failed(String),
}

impl CollectionOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::SkipLimit)
    }
}

/// Per-collection report produced at the end of a run
#[derive(Debug, Clone)]
pub struct CollectionSummary {
    pub collection: Collection,
    /// First page fetched in this run
    pub start_page: u32,
    /// Pages whose records were appended and checkpointed
    pub pages_completed: u32,
    /// Records newly appended to the log
    pub records_written: u64,
    /// Records already present in the log from an interrupted page
    pub duplicates_skipped: u64,
    pub items_seen: u64,
    pub items_out_of_window: u64,
    pub items_malformed: u64,
    pub degraded_sub_resources: u64,
    /// Pages that could not be fetched, in the order they were skipped
    pub skipped_pages: Vec<u32>,
    pub elapsed: Duration,
    pub outcome: CollectionOutcome,
}

impl CollectionSummary {
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            start_page: 1,
            pages_completed: 0,
            records_written: 0,
            duplicates_skipped: 0,
            items_seen: 0,
            items_out_of_window: 0,
            items_malformed: 0,
            degraded_sub_resources: 0,
            skipped_pages: Vec::new(),
            elapsed: Duration::ZERO,
            outcome: CollectionOutcome::Completed,
        }
    }

    /// Adds one page's item counters
    pub fn absorb(&mut self, stats: &PageStats) {
        self.items_seen += stats.seen as u64;
        self.items_out_of_window += stats.out_of_window as u64;
        self.items_malformed += stats.malformed as u64;
        self.degraded_sub_resources += stats.degraded_sub_resources as u64;
    }
}
