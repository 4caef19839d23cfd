//! Output module for run summaries and exports
//!
//! This module handles:
//! - Printing the per-collection summary at the end of a run
//! - Exporting a collection's record log to CSV

mod csv_export;
mod summary;

pub use csv_export::{
    csv_export_path, export_collections, export_records_to_csv, CollectionExport, CSV_COLUMNS,
};
pub use summary::{format_duration, print_summary};

use thiserror::Error;

/// Errors raised while exporting records
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
