//! File-backed checkpoint store
//!
//! Each collection gets a directory under the data root:
//!
//! ```text
//! {root}/{owner}/{name}/checkpoint_data.jsonl   one Record per line, append-only
//! {root}/{owner}/{name}/checkpoint_state.json   {"last_completed_page": N}
//! {root}/{owner}/{name}/skipped_pages.json      {"pages": [...]}
//! ```

use crate::model::{Collection, Record};
use crate::storage::traits::{CheckpointState, CheckpointStore, StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Name of the append-only record log
pub const RECORD_LOG_FILE: &str = "checkpoint_data.jsonl";

/// Name of the checkpoint state file
pub const STATE_FILE: &str = "checkpoint_state.json";

/// Name of the skipped-pages file
pub const SKIPPED_PAGES_FILE: &str = "skipped_pages.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct SkippedPages {
    pages: BTreeSet<u32>,
}

/// The one field of a logged record needed to rebuild the dedupe set
#[derive(Deserialize)]
struct LoggedId {
    pr_number: u64,
}

/// Open handle on a collection's record log
struct RecordLog {
    file: File,
    seen: HashSet<u64>,
}

impl RecordLog {
    /// Opens (or creates) the log, dropping a torn trailing line
    ///
    /// A crash in the middle of a write can leave a final line without its
    /// newline. That record was never acknowledged, so it is cut off and the
    /// file continues from the last complete line.
    fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }

        let created = !path.exists();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        if created {
            if let Some(parent) = path.parent() {
                sync_dir(parent)?;
            }
        }

        let mut seen = HashSet::new();
        let mut complete_len: u64 = 0;
        let mut line_number = 0;
        let mut reader = BufReader::new(&file);
        let mut line = Vec::new();

        loop {
            line.clear();
            let read = reader.read_until(b'\n', &mut line)?;
            if read == 0 {
                break;
            }

            if line.last() != Some(&b'\n') {
                tracing::warn!(
                    "{}: dropping {} bytes of an incomplete trailing record",
                    path.display(),
                    read
                );
                break;
            }

            line_number += 1;
            complete_len += read as u64;

            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            match serde_json::from_slice::<LoggedId>(&line) {
                Ok(id) => {
                    seen.insert(id.pr_number);
                }
                Err(e) => {
                    tracing::warn!("{}:{}: unreadable record: {}", path.display(), line_number, e);
                }
            }
        }

        if file.metadata()?.len() > complete_len {
            file.set_len(complete_len)?;
            file.sync_all()?;
        }

        tracing::debug!(
            "Opened {} with {} logged records",
            path.display(),
            seen.len()
        );

        Ok(Self { file, seen })
    }

    fn append(&mut self, record: &Record) -> StorageResult<bool> {
        if self.seen.contains(&record.pr_number) {
            return Ok(false);
        }

        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        self.file.write_all(&line)?;
        self.file.flush()?;
        self.file.sync_data()?;

        self.seen.insert(record.pr_number);
        Ok(true)
    }
}

/// Checkpoint store writing JSON files under a data directory
pub struct FileCheckpointStore {
    root: PathBuf,
    logs: HashMap<Collection, RecordLog>,
}

impl FileCheckpointStore {
    /// Creates a store rooted at `root`; nothing is touched until first use
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            logs: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding a collection's files
    pub fn collection_dir(&self, collection: &Collection) -> PathBuf {
        self.root.join(collection.state_dir())
    }

    pub fn record_log_path(&self, collection: &Collection) -> PathBuf {
        self.collection_dir(collection).join(RECORD_LOG_FILE)
    }

    pub fn state_path(&self, collection: &Collection) -> PathBuf {
        self.collection_dir(collection).join(STATE_FILE)
    }

    pub fn skipped_pages_path(&self, collection: &Collection) -> PathBuf {
        self.collection_dir(collection).join(SKIPPED_PAGES_FILE)
    }

    /// Reads the persisted checkpoint, if any
    pub fn checkpoint_state(&self, collection: &Collection) -> StorageResult<Option<CheckpointState>> {
        let path = self.state_path(collection);

        match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StorageError::CorruptState {
                    path,
                    message: e.to_string(),
                }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn log_for(&mut self, collection: &Collection) -> StorageResult<&mut RecordLog> {
        let path = self.record_log_path(collection);

        match self.logs.entry(collection.clone()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let log = RecordLog::open(&path)?;
                Ok(entry.insert(log))
            }
        }
    }

    fn read_skipped(&self, collection: &Collection) -> StorageResult<SkippedPages> {
        let path = self.skipped_pages_path(collection);

        match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| StorageError::CorruptState {
                path,
                message: e.to_string(),
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(SkippedPages::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_skipped(&self, collection: &Collection, skipped: &SkippedPages) -> StorageResult<()> {
        let bytes = serde_json::to_vec(skipped)?;
        write_atomically(&self.skipped_pages_path(collection), &bytes)
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn resume_point(&mut self, collection: &Collection) -> StorageResult<u32> {
        Ok(self
            .checkpoint_state(collection)?
            .map(|state| state.last_completed_page.saturating_add(1))
            .unwrap_or(1))
    }

    fn append(&mut self, collection: &Collection, record: &Record) -> StorageResult<bool> {
        let written = self.log_for(collection)?.append(record)?;
        if !written {
            tracing::debug!(
                "{}: PR #{} already logged, not appending again",
                collection,
                record.pr_number
            );
        }
        Ok(written)
    }

    fn advance(&mut self, collection: &Collection, page: u32) -> StorageResult<()> {
        let state = CheckpointState {
            last_completed_page: page,
        };
        let bytes = serde_json::to_vec(&state)?;
        write_atomically(&self.state_path(collection), &bytes)
    }

    fn mark_skipped(&mut self, collection: &Collection, page: u32) -> StorageResult<()> {
        let mut skipped = self.read_skipped(collection)?;
        if skipped.pages.insert(page) {
            self.write_skipped(collection, &skipped)?;
        }
        Ok(())
    }

    fn clear_skipped(&mut self, collection: &Collection, page: u32) -> StorageResult<()> {
        let mut skipped = self.read_skipped(collection)?;
        if skipped.pages.remove(&page) {
            self.write_skipped(collection, &skipped)?;
        }
        Ok(())
    }

    fn skipped_pages(&self, collection: &Collection) -> StorageResult<Vec<u32>> {
        Ok(self.read_skipped(collection)?.pages.into_iter().collect())
    }
}

/// Replaces `path` with `bytes` so readers see either the old or new content
fn write_atomically(path: &Path, bytes: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let tmp = path.with_extension("json.tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;

    if let Some(parent) = path.parent() {
        sync_dir(parent)?;
    }

    Ok(())
}

/// Creates `dir` if missing and syncs the directories that gained entries
fn ensure_dir(dir: &Path) -> io::Result<()> {
    if dir.is_dir() {
        return Ok(());
    }

    fs::create_dir_all(dir)?;

    // {owner} inside the root, {name} inside {owner}
    for ancestor in dir.ancestors().skip(1).take(2) {
        if !ancestor.as_os_str().is_empty() {
            sync_dir(ancestor)?;
        }
    }

    Ok(())
}

/// Flushes a directory's entries so new and renamed files survive power loss
#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
