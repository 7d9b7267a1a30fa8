//! Configuration for the session pool scheduler.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::record::CategoryId;

/// Per-category configuration: which feed to poll and where.
///
/// Categories are data, not subclasses - one generic session per
/// descriptor, with the endpoint passed opaquely to the feed source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDescriptor {
    /// Stable category identifier
    pub id: CategoryId,

    /// Opaque endpoint descriptor handed to `FeedSource::open`
    pub endpoint: String,
}

impl CategoryDescriptor {
    /// Create a descriptor.
    pub fn new(id: impl Into<CategoryId>, endpoint: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            endpoint: endpoint.into(),
        }
    }
}

/// Tunables for the scheduler loop and session lifecycle.
///
/// Cooldowns and thresholds are configuration, applied uniformly to every
/// session - there are no per-category special cases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Delay between extraction cycles.
    ///
    /// Default: 2 s. Live feeds want this short.
    pub tick_interval: Duration,

    /// Cadence of the recheck and reopen maintenance passes.
    ///
    /// Cleanup runs at twice this interval. Default: 60 s.
    pub recheck_interval: Duration,

    /// Deadline for one `extract` call. A call exceeding it counts as an
    /// error for that session only, never a scheduler-wide stall.
    ///
    /// Default: 15 s.
    pub extract_timeout: Duration,

    /// Cooldown before a redirected session may be reopened.
    ///
    /// Default: 30 min.
    pub redirect_cooldown: Duration,

    /// Empty checks before an idle session's handle is released.
    ///
    /// Default: 10.
    pub cleanup_threshold: u32,

    /// Cleanup only parks sessions at or below this error count.
    ///
    /// Default: 3.
    pub max_error_tolerance: u32,

    /// Errors after which a session is parked indefinitely (external
    /// reopen required).
    ///
    /// Default: 8.
    pub hard_error_ceiling: u32,

    /// Consecutive ticks with every extraction failing before the whole
    /// backend execution context is recreated.
    ///
    /// Default: 5.
    pub systemic_error_threshold: u32,

    /// How long removed records are retained in history.
    ///
    /// Default: 24 h.
    pub history_retention: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(2),
            recheck_interval: Duration::from_secs(60),
            extract_timeout: Duration::from_secs(15),
            redirect_cooldown: Duration::from_secs(30 * 60),
            cleanup_threshold: 10,
            max_error_tolerance: 3,
            hard_error_ceiling: 8,
            systemic_error_threshold: 5,
            history_retention: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl SchedulerConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tick interval.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Set the maintenance cadence.
    pub fn with_recheck_interval(mut self, interval: Duration) -> Self {
        self.recheck_interval = interval;
        self
    }

    /// Set the per-extraction deadline.
    pub fn with_extract_timeout(mut self, timeout: Duration) -> Self {
        self.extract_timeout = timeout;
        self
    }

    /// Set the redirect cooldown.
    pub fn with_redirect_cooldown(mut self, cooldown: Duration) -> Self {
        self.redirect_cooldown = cooldown;
        self
    }

    /// Set the empty-check cleanup threshold.
    pub fn with_cleanup_threshold(mut self, threshold: u32) -> Self {
        self.cleanup_threshold = threshold;
        self
    }

    /// Set the history retention window.
    pub fn with_history_retention(mut self, retention: Duration) -> Self {
        self.history_retention = retention;
        self
    }

    /// Cleanup cadence (twice the recheck cadence).
    pub fn cleanup_interval(&self) -> Duration {
        self.recheck_interval * 2
    }

    /// Recheck cadence as a chrono duration for timestamp arithmetic.
    pub fn recheck_interval_chrono(&self) -> chrono::Duration {
        to_chrono(self.recheck_interval)
    }

    /// Cleanup cadence as a chrono duration for timestamp arithmetic.
    pub fn cleanup_interval_chrono(&self) -> chrono::Duration {
        to_chrono(self.cleanup_interval())
    }

    /// Redirect cooldown as a chrono duration for timestamp arithmetic.
    pub fn redirect_cooldown_chrono(&self) -> chrono::Duration {
        to_chrono(self.redirect_cooldown)
    }

    /// History retention as a chrono duration for timestamp arithmetic.
    pub fn history_retention_chrono(&self) -> chrono::Duration {
        to_chrono(self.history_retention)
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::milliseconds(i64::MAX))
}
