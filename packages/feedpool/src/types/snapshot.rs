//! Persisted view schemas: snapshot, history, per-cycle statistics.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::types::record::{CategoryId, Record};

/// The full current record set plus metadata, persisted as one atomic unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotFile {
    /// When this snapshot was taken
    pub timestamp: DateTime<Utc>,

    /// Total records in the snapshot
    pub total_records: usize,

    /// Record count per category
    pub per_category_counts: IndexMap<CategoryId, usize>,

    /// All current records
    pub records: Vec<Record>,
}

/// A record that left the current set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// The record's last known state
    pub record: Record,

    /// When it disappeared from the candidate set
    pub removed_at: DateTime<Utc>,
}

/// Append-and-prune log of removed records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryFile {
    /// When this view was written
    pub timestamp: DateTime<Utc>,

    /// Entries inside the retention window, oldest first
    pub entries: Vec<HistoryEntry>,
}

/// Derived statistics for one completed cycle.
///
/// Written atomically alongside the snapshot, but independently - a stats
/// write failure never blocks the snapshot and vice versa.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleStats {
    /// When the cycle finished
    pub timestamp: DateTime<Utc>,

    /// Wall-clock duration of the cycle
    pub tick_duration_ms: u64,

    /// Sessions in the pool
    pub sessions_total: usize,

    /// Sessions that took part in the fan-out
    pub sessions_active: usize,

    /// Records in the store after the cycle
    pub records_total: usize,

    /// Record count per category after the cycle
    pub per_category_counts: IndexMap<CategoryId, usize>,

    /// Keys inserted this cycle
    pub inserted: usize,

    /// Keys whose payload changed this cycle
    pub updated: usize,

    /// Keys removed to history this cycle
    pub removed: usize,
}

impl CycleStats {
    /// True when the cycle changed nothing.
    pub fn is_noop(&self) -> bool {
        self.inserted == 0 && self.updated == 0 && self.removed == 0
    }
}
