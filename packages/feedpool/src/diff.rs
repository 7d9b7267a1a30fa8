//! Change detection: classify a merged candidate set against the store.
//!
//! A single tick's candidate set is authoritative for current truth. A key
//! absent from it is removed immediately - no multi-cycle grace period. A
//! parked session naturally excludes its records from the candidate set;
//! when it resumes they re-insert with a fresh `first_seen`.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::store::RecordStore;
use crate::types::record::{Record, RecordKey};

/// Classified differences between a candidate set and the store.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    /// Keys new to the store (`first_seen = last_updated = now`)
    pub inserted: Vec<Record>,

    /// Keys whose payload changed (`first_seen` preserved)
    pub updated: Vec<Record>,

    /// Keys absent from the candidate set, with their last known state
    pub removed: Vec<Record>,
}

impl ChangeSet {
    /// True when nothing changed.
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// Diff a deduplicated candidate set against the store.
///
/// Pure with respect to the store: mutations are applied separately via
/// [`RecordStore::apply`].
pub fn diff(store: &RecordStore, candidate: &[Record], now: DateTime<Utc>) -> ChangeSet {
    let mut changes = ChangeSet::default();

    let candidate_keys: HashSet<&RecordKey> = candidate.iter().map(|r| &r.key).collect();

    for record in candidate {
        match store.get(&record.key) {
            None => {
                let mut inserted = record.clone();
                inserted.first_seen = now;
                inserted.last_updated = now;
                changes.inserted.push(inserted);
            }
            Some(existing) => {
                if existing.payload != record.payload {
                    let mut updated = record.clone();
                    updated.first_seen = existing.first_seen;
                    updated.last_updated = now;
                    changes.updated.push(updated);
                }
                // Identical payload: no-op
            }
        }
    }

    for record in store.records() {
        if !candidate_keys.contains(&record.key) {
            changes.removed.push(record.clone());
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::resolver::DefaultResolver;
    use crate::types::record::{CategoryId, RawRecord};
    use chrono::Duration;

    fn record(home: &str, away: &str, now: DateTime<Utc>) -> Record {
        Record::from_raw(
            &CategoryId::new("soccer"),
            RawRecord::new(home, away),
            &DefaultResolver::new(),
            now,
        )
    }

    #[test]
    fn test_insert_sets_both_timestamps() {
        let t0 = Utc::now();
        let t1 = t0 + Duration::seconds(10);
        let store = RecordStore::new();

        let changes = diff(&store, &[record("A", "B", t0)], t1);
        assert_eq!(changes.inserted.len(), 1);
        assert_eq!(changes.inserted[0].first_seen, t1);
        assert_eq!(changes.inserted[0].last_updated, t1);
        assert!(changes.updated.is_empty());
        assert!(changes.removed.is_empty());
    }

    #[test]
    fn test_identical_payload_is_noop() {
        let now = Utc::now();
        let mut store = RecordStore::new();
        store.apply(diff(&store, &[record("A", "B", now)], now), now);

        let later = now + Duration::seconds(2);
        let changes = diff(&store, &[record("A", "B", later)], later);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_update_preserves_first_seen() {
        let t1 = Utc::now();
        let t2 = t1 + Duration::seconds(2);
        let mut store = RecordStore::new();
        store.apply(diff(&store, &[record("A", "B", t1)], t1), t1);

        let mut changed = record("A", "B", t2);
        changed.payload.score.home = 1;
        let changes = diff(&store, &[changed], t2);

        assert_eq!(changes.updated.len(), 1);
        assert_eq!(changes.updated[0].first_seen, t1);
        assert_eq!(changes.updated[0].last_updated, t2);
    }

    #[test]
    fn test_absence_in_single_pass_is_removal() {
        let now = Utc::now();
        let mut store = RecordStore::new();
        store.apply(
            diff(&store, &[record("A", "B", now), record("C", "D", now)], now),
            now,
        );

        let changes = diff(&store, &[record("A", "B", now)], now);
        assert_eq!(changes.removed.len(), 1);
        assert_eq!(changes.removed[0].key, record("C", "D", now).key);
    }

    #[test]
    fn test_diff_applied_twice_is_idempotent() {
        let now = Utc::now();
        let mut store = RecordStore::new();

        let candidate = vec![record("A", "B", now), record("C", "D", now)];
        store.apply(diff(&store, &candidate, now), now);
        let after_first: Vec<_> = store.records().cloned().collect();

        let second = diff(&store, &candidate, now + Duration::seconds(1));
        assert!(second.is_empty());
        store.apply(second, now);
        let after_second: Vec<_> = store.records().cloned().collect();

        assert_eq!(after_first, after_second);
    }
}
