//! Data types for records, sessions, configuration and snapshots.

pub mod config;
pub mod record;
pub mod session;
pub mod snapshot;

pub use config::{CategoryDescriptor, SchedulerConfig};
pub use record::{
    CategoryId, Market, MatchPayload, Quality, RawRecord, Record, RecordKey, Score, Selection,
};
pub use session::{Session, SessionState};
pub use snapshot::{CycleStats, HistoryEntry, HistoryFile, SnapshotFile};
