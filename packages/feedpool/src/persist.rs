//! Atomic persistence of snapshots, history and statistics.
//!
//! Contract: a reader sampling any of these files at any instant always
//! parses a complete, schema-valid document. Each write serializes to a
//! temporary file in the target directory, then renames over the target -
//! rename is the atomicity primitive. Writes are serialized behind an
//! async mutex so two write paths (the tick and a shutdown flush) never
//! interleave.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::PersistResult;
use crate::types::snapshot::{CycleStats, HistoryFile, SnapshotFile};

/// Snapshot file name inside the data directory.
pub const SNAPSHOT_FILE: &str = "snapshot.json";

/// History file name inside the data directory.
pub const HISTORY_FILE: &str = "history.json";

/// Statistics file name inside the data directory.
pub const STATS_FILE: &str = "stats.json";

/// Writes the record store and derived views to disk, atomically.
pub struct SnapshotWriter {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl SnapshotWriter {
    /// Create a writer rooted at a data directory.
    ///
    /// The directory is not created here; call [`Self::ensure_dir`] once
    /// at startup so a misconfigured path surfaces as a startup failure.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Data directory this writer targets.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of the snapshot file.
    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    /// Create the data directory if missing.
    pub async fn ensure_dir(&self) -> PersistResult<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Persist the snapshot view.
    pub async fn write_snapshot(&self, snapshot: &SnapshotFile) -> PersistResult<()> {
        self.write_atomic(SNAPSHOT_FILE, snapshot).await
    }

    /// Persist the history view.
    pub async fn write_history(&self, history: &HistoryFile) -> PersistResult<()> {
        self.write_atomic(HISTORY_FILE, history).await
    }

    /// Persist the per-cycle statistics view.
    ///
    /// Independent of the snapshot: either may succeed while the other
    /// fails.
    pub async fn write_stats(&self, stats: &CycleStats) -> PersistResult<()> {
        self.write_atomic(STATS_FILE, stats).await
    }

    /// Load the last persisted snapshot, if any.
    pub async fn load_snapshot(&self) -> PersistResult<Option<SnapshotFile>> {
        self.load(SNAPSHOT_FILE).await
    }

    /// Load the last persisted history, if any.
    pub async fn load_history(&self) -> PersistResult<Option<HistoryFile>> {
        self.load(HISTORY_FILE).await
    }

    /// Load the last persisted cycle statistics, if any.
    pub async fn load_stats(&self) -> PersistResult<Option<CycleStats>> {
        self.load(STATS_FILE).await
    }

    async fn load<T: DeserializeOwned>(&self, name: &str) -> PersistResult<Option<T>> {
        let path = self.dir.join(name);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn write_atomic<T: Serialize>(&self, name: &str, value: &T) -> PersistResult<()> {
        let _guard = self.write_lock.lock().await;

        let bytes = serde_json::to_vec_pretty(value)?;
        let target = self.dir.join(name);
        // Temp file must live in the same directory so the rename never
        // crosses a filesystem boundary
        let tmp = self.dir.join(format!("{name}.tmp"));

        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &target).await?;

        debug!(path = %target.display(), bytes = bytes.len(), "persisted view");
        Ok(())
    }
}
