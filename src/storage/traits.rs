//! Storage traits and error types
//!
//! This module defines the trait interface for checkpoint backends and
//! associated error types.

use crate::model::{Collection, Record};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt state file {path}: {message}")]
    CorruptState { path: PathBuf, message: String },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persisted progress marker for one collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointState {
    pub last_completed_page: u32,
}

/// Trait for checkpoint backends
///
/// Callers must finish every `append` for a page before calling `advance`
/// for it; a resumed crawl trusts that a checkpointed page is fully logged.
pub trait CheckpointStore {
    // ===== Resume =====

    /// Returns the page to start from: `last_completed_page + 1`, or 1
    fn resume_point(&mut self, collection: &Collection) -> StorageResult<u32>;

    // ===== Record Log =====

    /// Durably appends a record to the collection's log
    ///
    /// The record is on stable storage when this returns. Returns `false`
    /// without writing when a record with the same `pr_number` is already
    /// logged.
    fn append(&mut self, collection: &Collection, record: &Record) -> StorageResult<bool>;

    // ===== Checkpoint =====

    /// Durably records `page` as the last completed page
    fn advance(&mut self, collection: &Collection, page: u32) -> StorageResult<()>;

    // ===== Skipped Pages =====

    /// Remembers a page that could not be fetched
    fn mark_skipped(&mut self, collection: &Collection, page: u32) -> StorageResult<()>;

    /// Forgets a previously skipped page once it has been fetched
    fn clear_skipped(&mut self, collection: &Collection, page: u32) -> StorageResult<()>;

    /// Pages skipped by earlier runs, ascending
    fn skipped_pages(&self, collection: &Collection) -> StorageResult<Vec<u32>>;
}
