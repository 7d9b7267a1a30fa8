//! Session pool: owns every per-category session and its lifecycle.
//!
//! The pool is exclusively owned by the scheduler loop; maintenance passes
//! (recheck, cleanup, reopen) and outcome application all run on that one
//! owner, so no lock guards the session map.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::error::{Result, SchedulerError};
use crate::traits::source::{FeedHandle, FeedSource};
use crate::types::config::{CategoryDescriptor, SchedulerConfig};
use crate::types::record::CategoryId;
use crate::types::session::{Session, SessionState};

/// The set of long-lived polling sessions, one per configured category.
#[derive(Debug, Default)]
pub struct SessionPool {
    sessions: IndexMap<CategoryId, Session>,
}

impl SessionPool {
    /// Open one session per descriptor.
    ///
    /// A category whose open fails starts in `Error` state and is retried
    /// by later reopen passes. Fails outright only when *no* category
    /// could be opened - the scheduler never starts with zero sessions.
    pub async fn initialize<F: FeedSource>(
        source: &F,
        categories: &[CategoryDescriptor],
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let mut sessions = IndexMap::new();
        let mut opened = 0usize;

        for descriptor in categories {
            let mut session = Session::new(descriptor.id.clone(), descriptor.endpoint.clone());

            match source.open(&descriptor.id, &descriptor.endpoint).await {
                Ok(handle) => {
                    session.activate(handle, now);
                    opened += 1;
                }
                Err(e) => {
                    warn!(category = %descriptor.id, error = %e, "failed to open session");
                    session.record_error(now);
                }
            }

            sessions.insert(descriptor.id.clone(), session);
        }

        if opened == 0 {
            return Err(SchedulerError::NoSessions);
        }

        info!(
            opened,
            total = sessions.len(),
            source = source.name(),
            "session pool initialized"
        );
        Ok(Self { sessions })
    }

    /// Number of sessions in the pool.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// True when the pool holds no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Look up a session by category.
    pub fn get(&self, category: &CategoryId) -> Option<&Session> {
        self.sessions.get(category)
    }

    /// Mutable lookup, used by the scheduler's outcome application.
    pub fn get_mut(&mut self, category: &CategoryId) -> Option<&mut Session> {
        self.sessions.get_mut(category)
    }

    /// Iterate sessions in configuration order.
    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    /// Session count per state, for one structured log line per pass.
    pub fn state_counts(&self) -> IndexMap<SessionState, usize> {
        let mut counts: IndexMap<SessionState, usize> = IndexMap::new();
        for session in self.sessions.values() {
            *counts.entry(session.state).or_insert(0) += 1;
        }
        counts
    }

    /// Sessions to include in this tick's extraction fan-out.
    pub fn extraction_targets(&self, config: &SchedulerConfig) -> Vec<(CategoryId, FeedHandle)> {
        self.sessions
            .values()
            .filter(|s| s.is_extractable(config.hard_error_ceiling))
            .filter_map(|s| {
                s.handle
                    .clone()
                    .map(|handle| (s.category.clone(), handle))
            })
            .collect()
    }

    /// Recheck pass: move redirected sessions into `WaitingRetry` while
    /// their cooldown is pending. Health only - no data extraction.
    pub fn recheck_pass(&mut self, now: DateTime<Utc>) {
        for session in self.sessions.values_mut() {
            if session.state == SessionState::Redirected && !session.retry_due(now) {
                session.begin_waiting();
                debug!(
                    category = %session.category,
                    retry_after = ?session.retry_after,
                    "session waiting out redirect cooldown"
                );
            }
        }
    }

    /// Cleanup pass: release handles of sessions that have produced
    /// nothing for `cleanup_threshold` checks (and are not error-prone).
    ///
    /// Distinct from a redirect: no cooldown, eligible for the very next
    /// reopen pass.
    pub async fn cleanup_pass<F: FeedSource>(
        &mut self,
        source: &F,
        config: &SchedulerConfig,
    ) {
        for session in self.sessions.values_mut() {
            let idle = session.state == SessionState::Active
                && session.consecutive_empty_checks >= config.cleanup_threshold
                && session.error_count <= config.max_error_tolerance;
            if !idle {
                continue;
            }

            if let Some(handle) = session.park_idle() {
                info!(
                    category = %session.category,
                    empty_checks = session.consecutive_empty_checks,
                    "parking idle session"
                );
                if let Err(e) = source.close(handle).await {
                    warn!(category = %session.category, error = %e, "close failed");
                }
            }
        }
    }

    /// Reopen pass: recreate handles for parked sessions whose cooldown
    /// (if any) has elapsed.
    pub async fn reopen_pass<F: FeedSource>(
        &mut self,
        source: &F,
        config: &SchedulerConfig,
        now: DateTime<Utc>,
    ) {
        for session in self.sessions.values_mut() {
            if !session.needs_reopen(now, config.hard_error_ceiling) {
                continue;
            }

            match source.open(&session.category, &session.endpoint).await {
                Ok(handle) => {
                    info!(
                        category = %session.category,
                        from = session.state.label(),
                        "session reopened"
                    );
                    session.activate(handle, now);
                }
                Err(e) => {
                    warn!(category = %session.category, error = %e, "reopen failed");
                    session.record_error(now);
                }
            }
        }
    }

    /// External reopen surface: bring one category back regardless of its
    /// error count or cooldown.
    pub async fn force_reopen<F: FeedSource>(
        &mut self,
        source: &F,
        category: &CategoryId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let session =
            self.sessions
                .get_mut(category)
                .ok_or_else(|| SchedulerError::UnknownCategory {
                    category: category.to_string(),
                })?;

        if let Some(handle) = session.invalidate_handle() {
            if let Err(e) = source.close(handle).await {
                warn!(category = %category, error = %e, "close failed");
            }
        }

        let handle = source.open(&session.category, &session.endpoint).await?;
        session.activate(handle, now);
        Ok(())
    }

    /// Drop every handle without closing it and clear error counters.
    ///
    /// Used after `FeedSource::reset` - the old execution context is gone,
    /// so the handles have nothing left to close. The next reopen pass
    /// rebuilds them.
    pub fn invalidate_all_handles(&mut self) {
        for session in self.sessions.values_mut() {
            session.invalidate_handle();
            session.clear_errors();
        }
    }

    /// Close every open handle. Sessions keep their state; the pool can
    /// be resumed by a later reopen pass if not torn down.
    pub async fn shutdown<F: FeedSource>(&mut self, source: &F) {
        for session in self.sessions.values_mut() {
            if let Some(handle) = session.invalidate_handle() {
                if let Err(e) = source.close(handle).await {
                    warn!(category = %session.category, error = %e, "close failed");
                }
            }
        }
    }
}
