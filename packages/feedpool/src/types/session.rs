//! Per-category session state and its lifecycle transitions.
//!
//! All retry/backoff policy lives here as one explicit state machine.
//! Transitions are methods on [`Session`]; each is re-entrant and
//! idempotent - re-applying the same transition twice never double-charges
//! a cooldown or releases a handle twice (the handle `Option` is `take`n
//! exactly once).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::traits::source::FeedHandle;
use crate::types::record::CategoryId;

/// Health state of one polling session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Handle open, polled every tick
    Active,
    /// Endpoint no longer serves this category; handle released, cooldown set
    Redirected,
    /// Cooldown pending; every tick is a no-op until it elapses
    WaitingRetry,
    /// Handle proactively released after repeated empty checks; no cooldown
    Closed,
    /// Last extraction failed; retried next tick until the hard ceiling
    Error,
}

impl SessionState {
    /// Short lowercase label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Active => "active",
            SessionState::Redirected => "redirected",
            SessionState::WaitingRetry => "waiting_retry",
            SessionState::Closed => "closed",
            SessionState::Error => "error",
        }
    }
}

/// True when `from -> to` is an edge of the session lifecycle graph.
///
/// Self-loops are always legal (counters may move without a state change).
pub fn legal_transition(from: SessionState, to: SessionState) -> bool {
    use SessionState::*;

    if from == to {
        return true;
    }

    matches!(
        (from, to),
        (Active, Redirected)
            | (Active, Closed)
            | (Active, Error)
            | (Redirected, WaitingRetry)
            | (Redirected, Active)
            | (Redirected, Error)
            | (WaitingRetry, Active)
            | (WaitingRetry, Error)
            | (Closed, Active)
            | (Closed, Error)
            | (Error, Active)
            | (Error, Redirected)
    )
}

/// One long-lived polling session for one category.
///
/// Created during pool initialization and mutated only by the scheduler's
/// tick path (single owner per tick). A session that stops producing data
/// is parked, never deleted, so it can resume later.
#[derive(Debug, Clone)]
pub struct Session {
    /// Category this session polls
    pub category: CategoryId,

    /// Opaque endpoint descriptor passed to the feed source on open
    pub endpoint: String,

    /// Current lifecycle state
    pub state: SessionState,

    /// Live handle, present only while the source has resources open for us
    pub handle: Option<FeedHandle>,

    /// Successful-but-empty extractions since the last non-empty one
    pub consecutive_empty_checks: u32,

    /// Redirect signals since the last healthy extraction
    pub consecutive_redirects: u32,

    /// Failed extractions since the last success
    pub error_count: u32,

    /// Last time any extraction or health check touched this session
    pub last_check: Option<DateTime<Utc>>,

    /// Last time extraction returned records
    pub last_success: Option<DateTime<Utc>>,

    /// Earliest time a reopen may be attempted (None = no cooldown)
    pub retry_after: Option<DateTime<Utc>>,
}

impl Session {
    /// Create a session in `Closed` state with no handle.
    pub fn new(category: CategoryId, endpoint: impl Into<String>) -> Self {
        Self {
            category,
            endpoint: endpoint.into(),
            state: SessionState::Closed,
            handle: None,
            consecutive_empty_checks: 0,
            consecutive_redirects: 0,
            error_count: 0,
            last_check: None,
            last_success: None,
            retry_after: None,
        }
    }

    /// Bring the session up with a freshly opened handle.
    ///
    /// Used both at pool initialization and by the reopen pass. Resets all
    /// counters and clears any pending cooldown.
    pub fn activate(&mut self, handle: FeedHandle, now: DateTime<Utc>) {
        self.state = SessionState::Active;
        self.handle = Some(handle);
        self.consecutive_empty_checks = 0;
        self.consecutive_redirects = 0;
        self.error_count = 0;
        self.last_check = Some(now);
        self.retry_after = None;
    }

    /// Extraction succeeded with records.
    pub fn record_success(&mut self, now: DateTime<Utc>) {
        self.state = SessionState::Active;
        self.consecutive_empty_checks = 0;
        self.consecutive_redirects = 0;
        self.error_count = 0;
        self.last_check = Some(now);
        self.last_success = Some(now);
        self.retry_after = None;
    }

    /// Extraction succeeded but returned zero records.
    ///
    /// Does not change state (a healthy feed between matches is normal),
    /// but feeds the cleanup pass via `consecutive_empty_checks`.
    pub fn record_empty(&mut self, now: DateTime<Utc>) {
        if self.state == SessionState::Error {
            // A clean read recovers an errored session
            self.state = SessionState::Active;
            self.error_count = 0;
        }
        self.consecutive_empty_checks += 1;
        self.consecutive_redirects = 0;
        self.last_check = Some(now);
    }

    /// Extraction reported the endpoint no longer serves this category.
    ///
    /// Releases the handle for the caller to close and charges the cooldown.
    /// Idempotent: a session already redirected or waiting returns `None`
    /// and keeps its original `retry_after`.
    pub fn record_redirect(
        &mut self,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> Option<FeedHandle> {
        if !matches!(self.state, SessionState::Active | SessionState::Error) {
            return None;
        }

        self.state = SessionState::Redirected;
        self.consecutive_redirects += 1;
        self.consecutive_empty_checks = 0;
        self.error_count = 0;
        self.last_check = Some(now);
        self.retry_after = Some(now + cooldown);
        self.handle.take()
    }

    /// Extraction failed (transport error, timeout, backend crash).
    pub fn record_error(&mut self, now: DateTime<Utc>) {
        self.state = SessionState::Error;
        self.error_count += 1;
        self.last_check = Some(now);
    }

    /// Cleanup: proactively release the handle of an idle session.
    ///
    /// Unlike a redirect there is no cooldown - the session is eligible for
    /// reopening on the very next reopen pass. Returns the handle for the
    /// caller to close; `None` if the session was not `Active`.
    pub fn park_idle(&mut self) -> Option<FeedHandle> {
        if self.state != SessionState::Active {
            return None;
        }

        self.state = SessionState::Closed;
        self.retry_after = None;
        self.handle.take()
    }

    /// Recheck: a redirected session whose cooldown is still pending moves
    /// to `WaitingRetry`, where every tick is a no-op.
    pub fn begin_waiting(&mut self) {
        if self.state == SessionState::Redirected {
            self.state = SessionState::WaitingRetry;
        }
    }

    /// Drop the handle without closing it (the backend context is gone).
    pub fn invalidate_handle(&mut self) -> Option<FeedHandle> {
        self.handle.take()
    }

    /// Clear the error counter (after a backend reset).
    pub fn clear_errors(&mut self) {
        self.error_count = 0;
        if self.state == SessionState::Error {
            self.state = if self.handle.is_some() {
                SessionState::Active
            } else {
                SessionState::Closed
            };
        }
    }

    /// True once any pending cooldown has elapsed.
    pub fn retry_due(&self, now: DateTime<Utc>) -> bool {
        self.retry_after.map_or(true, |t| now >= t)
    }

    /// True when this session should be included in the extraction fan-out.
    ///
    /// `Error` sessions keep being retried every tick until the hard
    /// ceiling, after which they are parked indefinitely.
    pub fn is_extractable(&self, hard_error_ceiling: u32) -> bool {
        if self.handle.is_none() {
            return false;
        }
        match self.state {
            SessionState::Active => true,
            SessionState::Error => self.error_count <= hard_error_ceiling,
            _ => false,
        }
    }

    /// True when the reopen pass should attempt to recreate this session's
    /// handle.
    pub fn needs_reopen(&self, now: DateTime<Utc>, hard_error_ceiling: u32) -> bool {
        match self.state {
            SessionState::Closed | SessionState::WaitingRetry | SessionState::Redirected => {
                self.handle.is_none() && self.retry_due(now)
            }
            SessionState::Error => {
                self.handle.is_none() && self.error_count <= hard_error_ceiling
            }
            SessionState::Active => false,
        }
    }
}
