//! In-memory record store: the current record set plus removal history.
//!
//! Exclusively owned by the scheduler loop - no lock, no sharing. The only
//! mutation paths are [`RecordStore::apply`] (one change set per tick) and
//! [`RecordStore::prune_history`].

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::diff::ChangeSet;
use crate::types::record::{CategoryId, Record, RecordKey};
use crate::types::snapshot::{HistoryEntry, HistoryFile, SnapshotFile};

/// Keyed map of current records plus an append-only history of removals.
///
/// Invariant: at most one record per key, and a record is either current
/// or in history, never both.
#[derive(Debug, Default)]
pub struct RecordStore {
    records: IndexMap<RecordKey, Record>,
    history: Vec<HistoryEntry>,
}

impl RecordStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of current records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no records are tracked.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up a current record by key.
    pub fn get(&self, key: &RecordKey) -> Option<&Record> {
        self.records.get(key)
    }

    /// True when the key is in the current set.
    pub fn contains_key(&self, key: &RecordKey) -> bool {
        self.records.contains_key(key)
    }

    /// Iterate current records in stable insertion order.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    /// Removal history, oldest first.
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Record count per category, in category insertion order.
    pub fn per_category_counts(&self) -> IndexMap<CategoryId, usize> {
        let mut counts: IndexMap<CategoryId, usize> = IndexMap::new();
        for record in self.records.values() {
            *counts.entry(record.category.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Apply one tick's change set.
    ///
    /// Inserts and updates replace by key; removals leave the current set
    /// and are appended to history with the given removal time.
    pub fn apply(&mut self, changes: ChangeSet, removed_at: DateTime<Utc>) {
        for record in changes.inserted {
            self.records.insert(record.key.clone(), record);
        }
        for record in changes.updated {
            self.records.insert(record.key.clone(), record);
        }
        for record in changes.removed {
            self.records.shift_remove(&record.key);
            self.history.push(HistoryEntry { record, removed_at });
        }
    }

    /// Seed the store from previously persisted records (warm start).
    ///
    /// Timestamps are kept as persisted so `first_seen` survives restarts.
    pub fn load_records(&mut self, records: Vec<Record>) {
        for record in records {
            self.records.insert(record.key.clone(), record);
        }
    }

    /// Seed history from previously persisted entries (warm start).
    pub fn load_history(&mut self, entries: Vec<HistoryEntry>) {
        self.history = entries;
    }

    /// Drop history entries removed before the cutoff. Returns how many
    /// were pruned.
    pub fn prune_history(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.history.len();
        self.history.retain(|entry| entry.removed_at >= cutoff);
        before - self.history.len()
    }

    /// Materialize the snapshot view.
    pub fn to_snapshot(&self, timestamp: DateTime<Utc>) -> SnapshotFile {
        SnapshotFile {
            timestamp,
            total_records: self.records.len(),
            per_category_counts: self.per_category_counts(),
            records: self.records.values().cloned().collect(),
        }
    }

    /// Materialize the history view.
    pub fn to_history(&self, timestamp: DateTime<Utc>) -> HistoryFile {
        HistoryFile {
            timestamp,
            entries: self.history.clone(),
        }
    }
}
