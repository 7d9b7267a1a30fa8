//! Cross-session deduplication of one tick's extraction results.
//!
//! Two sessions transitionally serving overlapping feeds can report the
//! same match in the same tick. The merger resolves such duplicates to one
//! record per key by payload completeness
//! ([`Quality`](crate::types::record::Quality)), deterministically: buckets
//! are sorted by category before flattening, so the outcome does not depend
//! on which session's future completed first.

use indexmap::map::Entry;
use indexmap::IndexMap;
use tracing::debug;

use crate::types::record::{CategoryId, Record, RecordKey};

/// Merge per-session result buckets into one record-per-key candidate set.
///
/// Resolution order for duplicate keys: higher [`Record::quality`] wins
/// (markets, then live score, then league label); a tie keeps the record
/// seen first in cycle order.
pub fn merge_candidates(mut buckets: Vec<(CategoryId, Vec<Record>)>) -> Vec<Record> {
    buckets.sort_by(|a, b| a.0.cmp(&b.0));

    let mut merged: IndexMap<RecordKey, Record> = IndexMap::new();
    let mut duplicates = 0usize;

    for (_, records) in buckets {
        for record in records {
            match merged.entry(record.key.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(record);
                }
                Entry::Occupied(mut slot) => {
                    duplicates += 1;
                    if record.quality() > slot.get().quality() {
                        slot.insert(record);
                    }
                }
            }
        }
    }

    if duplicates > 0 {
        debug!(duplicates, "resolved duplicate keys during merge");
    }

    merged.into_values().collect()
}
