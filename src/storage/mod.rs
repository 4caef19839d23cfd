//! Storage module for durable crawl progress
//!
//! This module persists everything a crawl needs to resume:
//! - The checkpoint state (last completed page) per collection
//! - The append-only record log per collection
//! - The set of pages skipped by earlier runs, for targeted re-runs

mod file_store;
mod traits;

pub use file_store::{
    FileCheckpointStore, RECORD_LOG_FILE, SKIPPED_PAGES_FILE, STATE_FILE,
};
pub use traits::{CheckpointState, CheckpointStore, StorageError, StorageResult};
