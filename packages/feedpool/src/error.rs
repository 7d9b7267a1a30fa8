//! Typed errors for the feedpool library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.

use thiserror::Error;

/// Errors that can occur in the scheduler and session pool.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Feed source operation failed
    #[error("feed source error: {0}")]
    Source(#[from] SourceError),

    /// Snapshot persistence failed
    #[error("persistence error: {0}")]
    Persist(#[from] PersistError),

    /// Pool initialization produced zero usable sessions
    #[error("no sessions could be opened for any configured category")]
    NoSessions,

    /// Unknown category requested from the pool
    #[error("unknown category: {category}")]
    UnknownCategory { category: String },

    /// Operation was cancelled
    #[error("operation cancelled")]
    Cancelled,
}

/// Errors reported by a [`FeedSource`](crate::traits::FeedSource)
/// implementation.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Extraction exceeded its deadline
    #[error("timeout extracting category: {category}")]
    Timeout { category: String },

    /// Network or transport failure
    #[error("connection error: {0}")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Handle is no longer known to the source
    #[error("stale handle for category: {category}")]
    StaleHandle { category: String },

    /// The underlying execution context is unusable
    #[error("source backend failure: {0}")]
    Backend(String),
}

/// Errors that can occur while persisting or loading snapshots.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Filesystem operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type alias for scheduler operations.
pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Result type alias for feed source operations.
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Result type alias for persistence operations.
pub type PersistResult<T> = std::result::Result<T, PersistError>;
