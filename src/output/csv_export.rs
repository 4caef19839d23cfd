//! Tabular export of a collection's record log
//!
//! The export is derived data: it can be regenerated from the log at any
//! time and never feeds back into the crawl.

use crate::config::CrawlWindow;
use crate::model::{Collection, Record};
use crate::output::ExportError;
use crate::storage::FileCheckpointStore;
use chrono::Datelike;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Header row, in record field order
pub const CSV_COLUMNS: [&str; 13] = [
    "pr_number",
    "title",
    "state",
    "created_at",
    "closed_at",
    "merged_at",
    "author",
    "merged_by",
    "assignees",
    "reviewers",
    "commit_authors",
    "comment_authors",
    "review_comment_authors",
];

/// Where a collection's CSV export is written
///
/// `{data_dir}/{owner}/{name}/{owner}_{name}_prs_{start_year}_{end_year}.csv`
pub fn csv_export_path(data_dir: &Path, collection: &Collection, window: &CrawlWindow) -> PathBuf {
    data_dir.join(collection.state_dir()).join(format!(
        "{}_prs_{}_{}.csv",
        collection.slug(),
        window.start.year(),
        window.end.year()
    ))
}

/// Converts a JSONL record log into a CSV file
///
/// Lines that do not parse as records are logged and left out. A missing log
/// produces no file. The CSV is written beside its final path and renamed
/// into place, so an existing export is replaced whole.
///
/// # Returns
///
/// * `Ok(rows)` - Number of records written
/// * `Err(ExportError)` - Reading the log or writing the CSV failed
pub fn export_records_to_csv(log_path: &Path, csv_path: &Path) -> Result<usize, ExportError> {
    let log = match File::open(log_path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::info!("No record log at {}, nothing to export", log_path.display());
            return Ok(0);
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(parent) = csv_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = csv_path.with_extension("csv.tmp");
    let mut writer = csv::Writer::from_path(&tmp_path)?;
    writer.write_record(CSV_COLUMNS)?;

    let mut rows = 0;
    for (index, line) in BufReader::new(log).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let record: Record = match serde_json::from_str(&line) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(
                    "{}:{}: skipping unreadable record: {}",
                    log_path.display(),
                    index + 1,
                    e
                );
                continue;
            }
        };

        writer.write_record(row(&record))?;
        rows += 1;
    }

    writer.flush()?;
    drop(writer);
    if let Err(e) = fs::rename(&tmp_path, csv_path) {
        fs::remove_file(&tmp_path).ok();
        return Err(e.into());
    }

    tracing::info!("Exported {} records to {}", rows, csv_path.display());
    Ok(rows)
}

/// Result of exporting one collection
#[derive(Debug)]
pub struct CollectionExport {
    pub collection: Collection,
    pub csv_path: PathBuf,
    /// Rows written, or why the export failed
    pub result: Result<usize, ExportError>,
}

/// Exports the record log of every collection under `data_dir`
///
/// A failure for one collection is reported in its entry and does not stop
/// the others.
pub fn export_collections(
    data_dir: &Path,
    collections: &[Collection],
    window: &CrawlWindow,
) -> Vec<CollectionExport> {
    let store = FileCheckpointStore::new(data_dir);

    collections
        .iter()
        .map(|collection| {
            let csv_path = csv_export_path(data_dir, collection, window);
            let result = export_records_to_csv(&store.record_log_path(collection), &csv_path);
            if let Err(e) = &result {
                tracing::error!("{}: CSV export to {} failed: {}", collection, csv_path.display(), e);
            }
            CollectionExport {
                collection: collection.clone(),
                csv_path,
                result,
            }
        })
        .collect()
}

fn row(record: &Record) -> [String; 13] {
    [
        record.pr_number.to_string(),
        optional(&record.title),
        optional(&record.state),
        record.created_at.clone(),
        optional(&record.closed_at),
        optional(&record.merged_at),
        optional(&record.author),
        optional(&record.merged_by),
        list_literal(&record.assignees),
        list_literal(&record.reviewers),
        list_literal(&record.commit_authors),
        list_literal(&record.comment_authors),
        list_literal(&record.review_comment_authors),
    ]
}

fn optional(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

/// Renders a login set as `['a', 'b']`
fn list_literal(logins: &BTreeSet<String>) -> String {
    let quoted: Vec<String> = logins
        .iter()
        .map(|login| format!("'{}'", login.replace('\\', "\\\\").replace('\'', "\\'")))
        .collect();
    format!("[{}]", quoted.join(", "))
}
