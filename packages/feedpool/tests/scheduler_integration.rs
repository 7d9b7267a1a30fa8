//! End-to-end scheduler tests driving the full tick pipeline with a
//! scripted feed source: maintenance, fan-out, merge, diff, persistence.

use std::time::Duration;

use tempfile::TempDir;

use feedpool::testing::{raw_with_odds, MockFeedSource, MockOutcome};
use feedpool::{
    CategoryDescriptor, CategoryId, DefaultResolver, RawRecord, Scheduler, SchedulerConfig,
    SessionState, SnapshotWriter,
};

/// Config where every maintenance pass runs every tick.
fn eager_config() -> SchedulerConfig {
    SchedulerConfig::new()
        .with_tick_interval(Duration::from_millis(10))
        .with_recheck_interval(Duration::ZERO)
        .with_extract_timeout(Duration::from_millis(100))
}

async fn scheduler_with(
    source: MockFeedSource,
    categories: &[&str],
    config: SchedulerConfig,
    dir: &TempDir,
) -> Scheduler<MockFeedSource, DefaultResolver> {
    let descriptors: Vec<_> = categories
        .iter()
        .map(|id| CategoryDescriptor::new(*id, format!("endpoint-{id}")))
        .collect();
    Scheduler::initialize(
        source,
        DefaultResolver::new(),
        &descriptors,
        config,
        SnapshotWriter::new(dir.path()),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn insert_then_empty_moves_record_to_history() {
    let dir = TempDir::new().unwrap();
    let source = MockFeedSource::new().with_script(
        "soccer",
        [
            MockOutcome::Records(vec![raw_with_odds("Alpha", "Beta", "L1")]),
            MockOutcome::Empty,
        ],
    );
    let mut scheduler = scheduler_with(source, &["soccer"], eager_config(), &dir).await;

    let stats = scheduler.run_once().await;
    assert_eq!(stats.inserted, 1);
    assert_eq!(scheduler.store().len(), 1);
    let key = scheduler.store().records().next().unwrap().key.clone();
    let last_updated = scheduler.store().records().next().unwrap().last_updated;

    let stats = scheduler.run_once().await;
    assert_eq!(stats.removed, 1);
    assert!(scheduler.store().is_empty());

    // Exactly one history entry, with removed_at at or after the record's
    // last update
    let history = scheduler.store().history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].record.key, key);
    assert!(history[0].removed_at >= last_updated);
}

#[tokio::test]
async fn redirect_parks_session_and_cooldown_recovers_it() {
    let dir = TempDir::new().unwrap();
    let config = eager_config().with_redirect_cooldown(Duration::from_millis(100));
    let source = MockFeedSource::new().with_script(
        "soccer",
        [
            MockOutcome::Records(vec![raw_with_odds("Alpha", "Beta", "L1")]),
            MockOutcome::Redirected,
        ],
    );
    let mut scheduler = scheduler_with(source, &["soccer"], config, &dir).await;
    let category = CategoryId::new("soccer");

    scheduler.run_once().await;
    let original_first_seen = scheduler.store().records().next().unwrap().first_seen;

    // Redirect tick: handle released, cooldown charged, records removed
    let stats = scheduler.run_once().await;
    assert_eq!(stats.removed, 1);
    let session = scheduler.pool().get(&category).unwrap();
    assert_eq!(session.state, SessionState::Redirected);
    assert!(session.handle.is_none());
    assert!(session.retry_after.is_some());
    assert_eq!(scheduler.source().closed_categories(), vec![category.clone()]);

    // Cooldown pending: the session contributes nothing
    let stats = scheduler.run_once().await;
    assert_eq!(stats.sessions_active, 0);
    assert!(matches!(
        scheduler.pool().get(&category).unwrap().state,
        SessionState::Redirected | SessionState::WaitingRetry
    ));

    // Cooldown elapsed: reopened and reporting again
    tokio::time::sleep(Duration::from_millis(120)).await;
    scheduler.source().push_outcome(
        "soccer",
        MockOutcome::Records(vec![raw_with_odds("Alpha", "Beta", "L1")]),
    );
    let stats = scheduler.run_once().await;
    assert_eq!(scheduler.pool().get(&category).unwrap().state, SessionState::Active);
    assert_eq!(stats.inserted, 1);

    // Re-inserted with a fresh first_seen
    let reinserted = scheduler.store().records().next().unwrap();
    assert!(reinserted.first_seen > original_first_seen);
}

#[tokio::test]
async fn overlapping_sessions_merge_to_the_richer_record() {
    let dir = TempDir::new().unwrap();
    let source = MockFeedSource::new()
        .with_script(
            "soccer",
            [MockOutcome::Records(vec![raw_with_odds(
                "Alpha", "Beta", "L1",
            )])],
        )
        .with_script(
            "tennis",
            [MockOutcome::Records(vec![RawRecord::new("Alpha", "Beta")])],
        );
    let mut scheduler = scheduler_with(source, &["soccer", "tennis"], eager_config(), &dir).await;

    let stats = scheduler.run_once().await;
    assert_eq!(stats.inserted, 1);
    assert_eq!(scheduler.store().len(), 1);

    // The record with odds wins the merge
    let winner = scheduler.store().records().next().unwrap();
    assert_eq!(winner.category, CategoryId::new("soccer"));
    assert!(!winner.payload.markets.is_empty());
}

#[tokio::test]
async fn empty_checks_park_session_and_reopen_revives_it() {
    let dir = TempDir::new().unwrap();
    let config = eager_config().with_cleanup_threshold(2);
    let source = MockFeedSource::new();
    let mut scheduler = scheduler_with(source, &["soccer"], config, &dir).await;
    let category = CategoryId::new("soccer");

    // Two empty cycles reach the threshold
    scheduler.run_once().await;
    scheduler.run_once().await;
    assert_eq!(
        scheduler
            .pool()
            .get(&category)
            .unwrap()
            .consecutive_empty_checks,
        2
    );

    // Next maintenance parks the idle session, and the reopen pass in the
    // same cycle revives it - no cooldown for idle parking
    scheduler.run_once().await;
    let session = scheduler.pool().get(&category).unwrap();
    assert_eq!(session.state, SessionState::Active);
    assert_eq!(session.consecutive_empty_checks, 1);
    assert_eq!(scheduler.source().closed_categories(), vec![category.clone()]);
    assert_eq!(
        scheduler
            .source()
            .calls()
            .iter()
            .filter(|c| matches!(c, feedpool::testing::MockCall::Open { .. }))
            .count(),
        2
    );
}

#[tokio::test]
async fn persistence_failure_retains_store_and_recovers_next_tick() {
    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().join("data");
    let source = MockFeedSource::new().with_script(
        "soccer",
        [
            MockOutcome::Records(vec![raw_with_odds("Alpha", "Beta", "L1")]),
            MockOutcome::Records(vec![
                raw_with_odds("Alpha", "Beta", "L1"),
                raw_with_odds("Gamma", "Delta", "L1"),
            ]),
        ],
    );
    let descriptors = vec![CategoryDescriptor::new("soccer", "endpoint")];
    let mut scheduler = Scheduler::initialize(
        source,
        DefaultResolver::new(),
        &descriptors,
        eager_config(),
        SnapshotWriter::new(&data_dir),
    )
    .await
    .unwrap();

    // Break the write path out from under the scheduler
    std::fs::remove_dir_all(&data_dir).unwrap();
    scheduler.run_once().await;

    // Write failed, but the in-memory store took the tick's changes
    assert_eq!(scheduler.store().len(), 1);
    assert!(!data_dir.join("snapshot.json").exists());

    // Next tick the path is back and the file reflects that tick's content
    std::fs::create_dir_all(&data_dir).unwrap();
    scheduler.run_once().await;

    let bytes = std::fs::read(data_dir.join("snapshot.json")).unwrap();
    let snapshot: feedpool::SnapshotFile = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(snapshot.total_records, 2);
    assert_eq!(snapshot.records.len(), scheduler.store().len());
}

#[tokio::test]
async fn snapshot_round_trips_through_resume() {
    let dir = TempDir::new().unwrap();
    let source = MockFeedSource::new().with_script(
        "soccer",
        [
            MockOutcome::Records(vec![
                raw_with_odds("Alpha", "Beta", "L1"),
                raw_with_odds("Gamma", "Delta", "L2"),
            ]),
            MockOutcome::Empty,
        ],
    );
    let mut scheduler = scheduler_with(source, &["soccer"], eager_config(), &dir).await;
    scheduler.run_once().await;
    scheduler.run_once().await; // removes both, populating history
    let persisted: Vec<_> = scheduler.store().history().to_vec();
    scheduler.shutdown().await.unwrap();

    // A fresh scheduler over the same directory resumes the exact store
    let source = MockFeedSource::new();
    let mut resumed = scheduler_with(source, &["soccer"], eager_config(), &dir).await;
    let count = resumed.resume().await.unwrap();
    assert_eq!(count, 0);
    assert_eq!(resumed.store().history(), &persisted[..]);
}

#[tokio::test]
async fn resume_restores_current_records() {
    let dir = TempDir::new().unwrap();
    let source = MockFeedSource::new().with_script(
        "soccer",
        [MockOutcome::Records(vec![raw_with_odds(
            "Alpha", "Beta", "L1",
        )])],
    );
    let mut scheduler = scheduler_with(source, &["soccer"], eager_config(), &dir).await;
    scheduler.run_once().await;
    let original: Vec<_> = scheduler.store().records().cloned().collect();
    scheduler.shutdown().await.unwrap();

    let mut resumed =
        scheduler_with(MockFeedSource::new(), &["soccer"], eager_config(), &dir).await;
    assert_eq!(resumed.resume().await.unwrap(), 1);
    let restored: Vec<_> = resumed.store().records().cloned().collect();
    assert_eq!(restored, original);
}

#[tokio::test]
async fn observed_states_follow_the_lifecycle_graph() {
    let dir = TempDir::new().unwrap();
    let config = eager_config()
        .with_redirect_cooldown(Duration::from_millis(30))
        .with_cleanup_threshold(3);
    let source = MockFeedSource::new().with_script(
        "soccer",
        [
            MockOutcome::Records(vec![raw_with_odds("Alpha", "Beta", "L1")]),
            MockOutcome::Fail("flaky".into()),
            MockOutcome::Records(vec![raw_with_odds("Alpha", "Beta", "L1")]),
            MockOutcome::Redirected,
            // After the cooldown the session reopens and drains these
            MockOutcome::Empty,
            MockOutcome::Empty,
            MockOutcome::Empty,
            MockOutcome::Empty,
            MockOutcome::Records(vec![raw_with_odds("Alpha", "Beta", "L1")]),
        ],
    );
    let mut scheduler = scheduler_with(source, &["soccer"], config, &dir).await;
    let category = CategoryId::new("soccer");

    let mut observed = vec![scheduler.pool().get(&category).unwrap().state];
    for _ in 0..14 {
        scheduler.run_once().await;
        observed.push(scheduler.pool().get(&category).unwrap().state);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    for pair in observed.windows(2) {
        assert!(
            feedpool::types::session::legal_transition(pair[0], pair[1]),
            "illegal transition {:?} -> {:?} in {:?}",
            pair[0],
            pair[1],
            observed
        );
    }
}

#[tokio::test]
async fn reapplying_the_same_feed_is_a_noop() {
    let dir = TempDir::new().unwrap();
    let records = vec![
        raw_with_odds("Alpha", "Beta", "L1"),
        raw_with_odds("Gamma", "Delta", "L2"),
    ];
    let source = MockFeedSource::new().with_script(
        "soccer",
        [
            MockOutcome::Records(records.clone()),
            MockOutcome::Records(records),
        ],
    );
    let mut scheduler = scheduler_with(source, &["soccer"], eager_config(), &dir).await;

    let first = scheduler.run_once().await;
    assert_eq!(first.inserted, 2);
    let after_first: Vec<_> = scheduler.store().records().cloned().collect();

    let second = scheduler.run_once().await;
    assert!(second.is_noop());
    let after_second: Vec<_> = scheduler.store().records().cloned().collect();
    assert_eq!(after_first, after_second);
}

#[tokio::test]
async fn run_drains_and_flushes_on_cancellation() {
    let dir = TempDir::new().unwrap();
    // Enough scripted cycles that the feed keeps serving until cancellation
    let source = MockFeedSource::new().with_script(
        "soccer",
        vec![MockOutcome::Records(vec![raw_with_odds("Alpha", "Beta", "L1")]); 32],
    );
    let mut scheduler = scheduler_with(source, &["soccer"], eager_config(), &dir).await;

    let cancel = tokio_util::sync::CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    scheduler.run(cancel).await.unwrap();

    // Final flush left a complete snapshot and closed every handle
    let bytes = std::fs::read(dir.path().join("snapshot.json")).unwrap();
    let snapshot: feedpool::SnapshotFile = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(snapshot.total_records, 1);
    assert!(scheduler.pool().sessions().all(|s| s.handle.is_none()));
}
