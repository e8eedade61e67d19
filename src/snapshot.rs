//! Snapshot store.
//!
//! The snapshot of the last successful run is the baseline for the next
//! diff, so it is written durably: to a temporary file, flushed with
//! `sync_all`, then renamed over the previous one. The diff of the run is
//! written next to it for inspection only; failing to write it is logged
//! and reported but never fails the run.
//!
//! # Files
//!
//! Both live in the configured directory (default `_change-log/`):
//!
//! | File | Content |
//! |------|---------|
//! | `changes-hash.json` | `{"algoliaIndex": ..., "changes": {docID: hash}, "timestamp": epoch-millis}` |
//! | `last-diff.json` | `{"added": [...], "changed": [...], "deleted": [...], "changeID": ...}` (pretty-printed) |

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::SnapshotConfig;
use crate::error::SyncError;
use crate::models::{Diff, HashSnapshot};

pub const SNAPSHOT_FILE: &str = "changes-hash.json";
pub const DIFF_FILE: &str = "last-diff.json";

/// Persisted form of a [`HashSnapshot`], tagged with the index it was
/// published to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    #[serde(rename = "algoliaIndex")]
    pub index_name: String,
    pub changes: HashSnapshot,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// Whether a run should write its snapshot and diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistPolicy {
    Always,
    Never,
    /// Persist unless environment variable `var` equals `value`
    /// (e.g. `DOCSYNC_ENV=development`).
    UnlessEnv { var: String, value: String },
}

impl PersistPolicy {
    pub fn should_persist(&self) -> bool {
        self.should_persist_with(|var| std::env::var(var).ok())
    }

    fn should_persist_with(&self, lookup: impl Fn(&str) -> Option<String>) -> bool {
        match self {
            PersistPolicy::Always => true,
            PersistPolicy::Never => false,
            PersistPolicy::UnlessEnv { var, value } => lookup(var).as_deref() != Some(value),
        }
    }
}

/// What [`SnapshotStore::persist`] wrote.
#[derive(Debug, Clone)]
pub struct PersistOutcome {
    pub snapshot_path: PathBuf,
    /// `None` when the diff could not be written.
    pub diff_path: Option<PathBuf>,
    pub diff_error: Option<String>,
}

pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_config(config: &SnapshotConfig) -> Self {
        Self::new(&config.dir)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    pub fn diff_path(&self) -> PathBuf {
        self.dir.join(DIFF_FILE)
    }

    /// Load the last persisted snapshot record, if any.
    pub fn load(&self) -> Result<Option<SnapshotRecord>, SyncError> {
        let path = self.snapshot_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no previous snapshot");
                return Ok(None);
            }
            Err(source) => return Err(SyncError::Persist { path, source }),
        };

        let record = serde_json::from_str(&content).map_err(|e| SyncError::Persist {
            path: path.clone(),
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })?;
        Ok(Some(record))
    }

    /// Baseline for the next diff: the stored snapshot, or empty on first run.
    pub fn load_baseline(&self) -> Result<HashSnapshot, SyncError> {
        Ok(self.load()?.map(|r| r.changes).unwrap_or_default())
    }

    /// Write `snapshot` (tagged with `index_name` and the current time)
    /// and `diff`.
    ///
    /// Returns an error only if the snapshot itself could not be written.
    pub fn persist(
        &self,
        snapshot: &HashSnapshot,
        diff: &Diff,
        index_name: &str,
    ) -> Result<PersistOutcome, SyncError> {
        let record = SnapshotRecord {
            index_name: index_name.to_string(),
            changes: snapshot.clone(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        };

        let snapshot_path = self.snapshot_path();
        let bytes = serde_json::to_vec(&record).map_err(|e| SyncError::Persist {
            path: snapshot_path.clone(),
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })?;
        write_durable(&snapshot_path, &bytes).map_err(|source| SyncError::Persist {
            path: snapshot_path.clone(),
            source,
        })?;
        info!(
            path = %snapshot_path.display(),
            documents = snapshot.len(),
            "snapshot written"
        );

        let diff_path = self.diff_path();
        let diff_result = serde_json::to_vec_pretty(diff)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
            .and_then(|bytes| write_durable(&diff_path, &bytes));

        let (diff_path, diff_error) = match diff_result {
            Ok(()) => {
                info!(path = %diff_path.display(), "last diff written");
                (Some(diff_path), None)
            }
            Err(e) => {
                warn!(path = %diff_path.display(), error = %e, "failed to write diff");
                (None, Some(e.to_string()))
            }
        };

        Ok(PersistOutcome {
            snapshot_path,
            diff_path,
            diff_error,
        })
    }
}

/// Write `bytes` to `path` atomically: temp file, fsync, rename.
fn write_durable(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = dir.join(tmp_name);

    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;

    // Persist the rename itself; not supported on every platform.
    if let Ok(dir_handle) = File::open(dir) {
        let _ = dir_handle.sync_all();
    }
    Ok(())
}
