//! The extraction scheduler: one control loop driving the whole system.
//!
//! Each tick: maintenance (recheck / cleanup / reopen on their cadences),
//! concurrent extraction fan-out over every active session, fan-in into one
//! candidate list, dedup, diff against the store, then one atomic persist.
//!
//! Collect-then-write-once is deliberate: writing once per full cycle,
//! instead of once per session as results land, means a reader of the
//! snapshot never observes a fast session's records without the slow
//! session's records for the same tick.
//!
//! All mutation of the pool and the store happens on this loop - the only
//! concurrency is the extraction fan-out, which borrows the source
//! immutably and returns owned results.

use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::diff;
use crate::error::{PersistResult, Result, SourceError};
use crate::merge;
use crate::persist::SnapshotWriter;
use crate::pool::SessionPool;
use crate::store::RecordStore;
use crate::traits::resolver::NameResolver;
use crate::traits::source::{FeedSource, FeedStatus};
use crate::types::config::{CategoryDescriptor, SchedulerConfig};
use crate::types::record::{CategoryId, RawRecord, Record};
use crate::types::snapshot::CycleStats;

/// Classified result of one session's extraction this tick.
enum ExtractOutcome {
    Records(Vec<RawRecord>),
    Empty,
    Redirected,
    Failed(SourceError),
}

/// The session pool scheduler.
///
/// Owns the pool, the record store and the snapshot writer outright;
/// lifecycle is `initialize → run / run_once → shutdown`.
pub struct Scheduler<F, R>
where
    F: FeedSource,
    R: NameResolver,
{
    source: F,
    resolver: R,
    config: SchedulerConfig,
    pool: SessionPool,
    store: RecordStore,
    writer: SnapshotWriter,
    last_recheck: DateTime<Utc>,
    last_cleanup: DateTime<Utc>,
    last_reopen: DateTime<Utc>,
    consecutive_failed_ticks: u32,
}

impl<F, R> Scheduler<F, R>
where
    F: FeedSource,
    R: NameResolver,
{
    /// Open the session pool and prepare the data directory.
    ///
    /// Fails when the data directory cannot be created or when no session
    /// could be opened for any category - the scheduler never starts a
    /// loop with zero sessions.
    pub async fn initialize(
        source: F,
        resolver: R,
        categories: &[CategoryDescriptor],
        config: SchedulerConfig,
        writer: SnapshotWriter,
    ) -> Result<Self> {
        writer.ensure_dir().await?;

        let now = Utc::now();
        let pool = SessionPool::initialize(&source, categories, now).await?;

        Ok(Self {
            source,
            resolver,
            config,
            pool,
            store: RecordStore::new(),
            writer,
            last_recheck: now,
            last_cleanup: now,
            last_reopen: now,
            consecutive_failed_ticks: 0,
        })
    }

    /// Seed the store from the last persisted snapshot and history, so a
    /// restart does not flap every record through removal. Returns the
    /// number of records resumed.
    pub async fn resume(&mut self) -> Result<usize> {
        let mut resumed = 0;

        if let Some(snapshot) = self.writer.load_snapshot().await? {
            resumed = snapshot.records.len();
            self.store.load_records(snapshot.records);
        }
        if let Some(history) = self.writer.load_history().await? {
            self.store.load_history(history.entries);
        }

        if resumed > 0 {
            info!(records = resumed, "resumed from persisted snapshot");
        }
        Ok(resumed)
    }

    /// Current record store (read-only).
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Current session pool (read-only).
    pub fn pool(&self) -> &SessionPool {
        &self.pool
    }

    /// Active configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// The feed source driving this scheduler.
    pub fn source(&self) -> &F {
        &self.source
    }

    /// Run until the token is cancelled, then drain and flush.
    ///
    /// Cancellation is only observed between ticks: a tick in progress
    /// always finishes its collect → merge → persist pass, so the on-disk
    /// snapshot is never abandoned mid-write.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<()> {
        info!(
            sessions = self.pool.len(),
            tick = ?self.config.tick_interval,
            source = self.source.name(),
            "scheduler running"
        );

        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("shutdown requested, draining");
                    break;
                }
                _ = ticker.tick() => {
                    let stats = self.run_once().await;
                    debug!(
                        duration_ms = stats.tick_duration_ms,
                        records = stats.records_total,
                        "cycle complete"
                    );
                }
            }
        }

        self.shutdown().await
    }

    /// Run exactly one extraction/maintenance cycle.
    pub async fn run_once(&mut self) -> CycleStats {
        let started = Instant::now();
        let now = Utc::now();

        self.maintenance(now).await;

        let outcomes = self.fan_out().await;
        let attempted = outcomes.len();
        let failed = outcomes
            .iter()
            .filter(|(_, o)| matches!(o, ExtractOutcome::Failed(_)))
            .count();

        let buckets = self.apply_outcomes(outcomes, now).await;
        self.note_tick_failures(attempted, failed).await;

        let candidate = merge::merge_candidates(buckets);
        let changes = diff::diff(&self.store, &candidate, now);
        let (inserted, updated, removed) = (
            changes.inserted.len(),
            changes.updated.len(),
            changes.removed.len(),
        );

        self.store.apply(changes, now);
        self.store
            .prune_history(now - self.config.history_retention_chrono());

        let stats = CycleStats {
            timestamp: now,
            tick_duration_ms: started.elapsed().as_millis() as u64,
            sessions_total: self.pool.len(),
            sessions_active: attempted,
            records_total: self.store.len(),
            per_category_counts: self.store.per_category_counts(),
            inserted,
            updated,
            removed,
        };

        if let Err(e) = self.persist(&stats).await {
            // The store stays as-is in memory; next tick rewrites the
            // full snapshot, so nothing is lost but freshness
            warn!(error = %e, "persistence failed, retrying next tick");
        }

        if !stats.is_noop() {
            info!(
                inserted,
                updated,
                removed,
                total = stats.records_total,
                "cycle applied changes"
            );
        }

        stats
    }

    /// Close every handle and flush a final snapshot.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.pool.shutdown(&self.source).await;

        let now = Utc::now();
        self.writer.write_snapshot(&self.store.to_snapshot(now)).await?;
        self.writer.write_history(&self.store.to_history(now)).await?;

        info!(records = self.store.len(), "scheduler stopped, final snapshot flushed");
        Ok(())
    }

    /// Bring one category back regardless of cooldowns or error ceilings.
    pub async fn force_reopen(&mut self, category: &CategoryId) -> Result<()> {
        self.pool
            .force_reopen(&self.source, category, Utc::now())
            .await
    }

    async fn maintenance(&mut self, now: DateTime<Utc>) {
        if now - self.last_recheck >= self.config.recheck_interval_chrono() {
            self.pool.recheck_pass(now);
            self.last_recheck = now;
        }

        if now - self.last_cleanup >= self.config.cleanup_interval_chrono() {
            self.pool.cleanup_pass(&self.source, &self.config).await;
            self.last_cleanup = now;
        }

        if now - self.last_reopen >= self.config.recheck_interval_chrono() {
            self.pool.reopen_pass(&self.source, &self.config, now).await;
            self.last_reopen = now;
            debug!(states = ?self.pool.state_counts(), "maintenance complete");
        }
    }

    /// Fan out one `extract` per active session, concurrently, and collect
    /// results as they complete.
    async fn fan_out(&self) -> Vec<(CategoryId, ExtractOutcome)> {
        let targets = self.pool.extraction_targets(&self.config);
        let deadline = self.config.extract_timeout;

        let mut in_flight = FuturesUnordered::new();
        for (category, handle) in targets {
            let source = &self.source;
            in_flight.push(async move {
                let result = tokio::time::timeout(deadline, source.extract(&handle)).await;
                (category, result)
            });
        }

        let mut outcomes = Vec::with_capacity(in_flight.len());
        while let Some((category, result)) = in_flight.next().await {
            let outcome = match result {
                Err(_elapsed) => ExtractOutcome::Failed(SourceError::Timeout {
                    category: category.to_string(),
                }),
                Ok(Err(e)) => ExtractOutcome::Failed(e),
                Ok(Ok(extraction)) => match extraction.status {
                    FeedStatus::Redirected => ExtractOutcome::Redirected,
                    FeedStatus::Serving if extraction.records.is_empty() => ExtractOutcome::Empty,
                    FeedStatus::Serving => ExtractOutcome::Records(extraction.records),
                },
            };
            outcomes.push((category, outcome));
        }

        outcomes
    }

    /// Apply each session's outcome to the state machine and canonicalize
    /// the raw records into per-category buckets. No store mutation here.
    async fn apply_outcomes(
        &mut self,
        outcomes: Vec<(CategoryId, ExtractOutcome)>,
        now: DateTime<Utc>,
    ) -> Vec<(CategoryId, Vec<Record>)> {
        let cooldown = self.config.redirect_cooldown_chrono();
        let mut buckets = Vec::new();

        for (category, outcome) in outcomes {
            match outcome {
                ExtractOutcome::Records(raws) => {
                    if let Some(session) = self.pool.get_mut(&category) {
                        session.record_success(now);
                    }
                    let records = raws
                        .into_iter()
                        .map(|raw| Record::from_raw(&category, raw, &self.resolver, now))
                        .collect();
                    buckets.push((category, records));
                }
                ExtractOutcome::Empty => {
                    if let Some(session) = self.pool.get_mut(&category) {
                        session.record_empty(now);
                    }
                }
                ExtractOutcome::Redirected => {
                    warn!(category = %category, "feed redirected, cooling down");
                    let freed = self
                        .pool
                        .get_mut(&category)
                        .and_then(|s| s.record_redirect(now, cooldown));
                    if let Some(handle) = freed {
                        if let Err(e) = self.source.close(handle).await {
                            warn!(category = %category, error = %e, "close failed");
                        }
                    }
                }
                ExtractOutcome::Failed(e) => {
                    warn!(category = %category, error = %e, "extraction failed");
                    if let Some(session) = self.pool.get_mut(&category) {
                        session.record_error(now);
                    }
                }
            }
        }

        buckets
    }

    /// Track whole-tick failures and recreate the backend execution
    /// context when every session keeps failing - that is systemic, not
    /// per-session, breakage.
    async fn note_tick_failures(&mut self, attempted: usize, failed: usize) {
        if attempted == 0 || failed < attempted {
            self.consecutive_failed_ticks = 0;
            return;
        }

        self.consecutive_failed_ticks += 1;
        if self.consecutive_failed_ticks < self.config.systemic_error_threshold {
            return;
        }

        warn!(
            ticks = self.consecutive_failed_ticks,
            "every session failing, recreating backend context"
        );
        if let Err(e) = self.source.reset().await {
            // Keep the counter so the reset is retried next tick
            warn!(error = %e, "backend reset failed");
            return;
        }

        self.consecutive_failed_ticks = 0;
        self.pool.invalidate_all_handles();
        let now = Utc::now();
        self.pool.reopen_pass(&self.source, &self.config, now).await;
        self.last_reopen = now;
    }

    async fn persist(&self, stats: &CycleStats) -> PersistResult<()> {
        // Stats are best-effort and independent of the snapshot
        if let Err(e) = self.writer.write_stats(stats).await {
            warn!(error = %e, "stats write failed");
        }

        self.writer
            .write_snapshot(&self.store.to_snapshot(stats.timestamp))
            .await?;
        self.writer
            .write_history(&self.store.to_history(stats.timestamp))
            .await?;
        Ok(())
    }
}
