//! Session-Pooled Live Feed Monitoring
//!
//! A library for coordinating many long-lived polling sessions - one per
//! feed category - with independent health, per-session retry policy, and
//! one consolidated, always-consistent snapshot of current records.
//!
//! # Design Philosophy
//!
//! **"One owner, one write per tick"**
//!
//! - The control loop is the sole mutator of the pool and the store, so
//!   in-memory structures need no locks
//! - Extractions fan out concurrently, results fan in before anything is
//!   written - readers never see a half-applied tick
//! - Retry and backoff live in one explicit session state machine, not in
//!   counters scattered across call sites
//! - Snapshots are persisted by temp-file-and-rename, so a reader always
//!   parses a complete document
//!
//! # Usage
//!
//! ```rust,ignore
//! use feedpool::{
//!     CategoryDescriptor, DefaultResolver, Scheduler, SchedulerConfig, SnapshotWriter,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! let categories = vec![
//!     CategoryDescriptor::new("soccer", "https://feeds.example/soccer"),
//!     CategoryDescriptor::new("tennis", "https://feeds.example/tennis"),
//! ];
//!
//! let mut scheduler = Scheduler::initialize(
//!     my_feed_source,            // impl FeedSource
//!     DefaultResolver::new(),    // impl NameResolver
//!     &categories,
//!     SchedulerConfig::default(),
//!     SnapshotWriter::new("data"),
//! )
//! .await?;
//!
//! let cancel = CancellationToken::new();
//! scheduler.run(cancel).await?;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - The two external seams ([`FeedSource`], [`NameResolver`])
//! - [`types`] - Records, sessions, configuration, persisted schemas
//! - [`pool`] - Session pool and its maintenance passes
//! - [`scheduler`] - The tick loop
//! - [`merge`] / [`diff`] - Cross-session dedup and change detection
//! - [`store`] / [`persist`] - In-memory store and atomic snapshots
//! - [`testing`] - Scriptable mock feed source

pub mod diff;
pub mod error;
pub mod merge;
pub mod persist;
pub mod pool;
pub mod scheduler;
pub mod store;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{PersistError, Result, SchedulerError, SourceError, SourceResult};
pub use traits::{
    resolver::{DefaultResolver, NameResolver},
    source::{Extraction, FeedHandle, FeedSource, FeedStatus},
};
pub use types::{
    config::{CategoryDescriptor, SchedulerConfig},
    record::{CategoryId, Market, MatchPayload, Quality, RawRecord, Record, RecordKey, Score, Selection},
    session::{Session, SessionState},
    snapshot::{CycleStats, HistoryEntry, HistoryFile, SnapshotFile},
};

// Re-export the moving parts
pub use diff::{diff, ChangeSet};
pub use merge::merge_candidates;
pub use persist::SnapshotWriter;
pub use pool::SessionPool;
pub use scheduler::Scheduler;
pub use store::RecordStore;
