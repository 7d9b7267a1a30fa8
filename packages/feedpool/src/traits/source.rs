//! FeedSource trait for pluggable extraction backends.
//!
//! The scheduler never talks to a site directly. It opens one handle per
//! category, calls `extract` on it each tick, and closes it when a session
//! is parked. What a handle *is* (a browser tab, an HTTP client, a fixture
//! file) is entirely the backend's business.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SourceResult;
use crate::types::record::{CategoryId, RawRecord};

/// Opaque handle to one live polling unit inside a feed source.
///
/// Minted by [`FeedSource::open`] and owned by a session until the session
/// is parked or the pool shuts down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedHandle {
    id: Uuid,
    category: CategoryId,
}

impl FeedHandle {
    /// Mint a fresh handle for a category.
    pub fn new(category: CategoryId) -> Self {
        Self {
            id: Uuid::new_v4(),
            category,
        }
    }

    /// Unique handle id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Category this handle was opened for.
    pub fn category(&self) -> &CategoryId {
        &self.category
    }
}

/// Health of a feed as observed by one extraction call.
///
/// `Redirected` is a first-class signal, not an error: the endpoint
/// answered, but it no longer serves the category the handle was opened
/// for. Transport failures are reported through `Err(SourceError)` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    /// Endpoint is serving its own category
    Serving,
    /// Endpoint answered but serves a different category
    Redirected,
}

/// Result of one extraction call: zero or more raw records plus the
/// feed's observed health.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Observed feed health
    pub status: FeedStatus,

    /// Records parsed from the feed (empty is a valid, healthy result)
    pub records: Vec<RawRecord>,
}

impl Extraction {
    /// A healthy extraction carrying records.
    pub fn serving(records: Vec<RawRecord>) -> Self {
        Self {
            status: FeedStatus::Serving,
            records,
        }
    }

    /// A healthy extraction with no records.
    pub fn empty() -> Self {
        Self::serving(Vec::new())
    }

    /// A redirect signal. Any records that came with it are discarded by
    /// the scheduler, so none are carried.
    pub fn redirected() -> Self {
        Self {
            status: FeedStatus::Redirected,
            records: Vec::new(),
        }
    }

    /// True when the feed is serving and returned at least one record.
    pub fn has_records(&self) -> bool {
        self.status == FeedStatus::Serving && !self.records.is_empty()
    }
}

/// Feed source trait for pluggable extraction backends.
///
/// Implementations must never return partial records without identifying
/// attributes, and must report redirects via [`FeedStatus::Redirected`]
/// rather than an error - the two drive different session transitions.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Open a polling handle for a category at the given endpoint.
    async fn open(&self, category: &CategoryId, endpoint: &str) -> SourceResult<FeedHandle>;

    /// Fetch and parse the feed behind a handle once.
    async fn extract(&self, handle: &FeedHandle) -> SourceResult<Extraction>;

    /// Release a handle and its underlying resources.
    ///
    /// Must be idempotent: closing an already-released handle is a no-op.
    async fn close(&self, handle: FeedHandle) -> SourceResult<()>;

    /// Tear down and recreate the entire underlying execution context.
    ///
    /// Called by the scheduler after systemic failure (every session
    /// erroring for several consecutive ticks). All outstanding handles
    /// become invalid afterwards.
    async fn reset(&self) -> SourceResult<()> {
        Ok(())
    }

    /// Source name (for logging/debugging).
    fn name(&self) -> &str {
        "unknown"
    }
}
