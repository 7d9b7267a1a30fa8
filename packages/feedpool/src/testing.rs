//! Testing utilities including mock implementations.
//!
//! These are useful for testing applications that drive the scheduler
//! without a real extraction backend.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{SourceError, SourceResult};
use crate::traits::source::{Extraction, FeedHandle, FeedSource};
use crate::types::record::{CategoryId, Market, RawRecord};

/// One scripted extraction result.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Healthy extraction carrying records
    Records(Vec<RawRecord>),
    /// Healthy extraction with zero records
    Empty,
    /// Redirect signal
    Redirected,
    /// Transport failure with a message
    Fail(String),
    /// Never resolves (for exercising the extract timeout)
    Hang,
}

/// Record of a call made to the mock source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Open { category: CategoryId },
    Extract { category: CategoryId },
    Close { category: CategoryId },
    Reset,
}

/// A scriptable [`FeedSource`] for tests.
///
/// Each category carries a queue of [`MockOutcome`]s consumed one per
/// extraction; an exhausted queue keeps returning `Empty`. Outcomes can be
/// scripted up front with the builder or pushed mid-run.
#[derive(Default)]
pub struct MockFeedSource {
    scripts: RwLock<HashMap<CategoryId, VecDeque<MockOutcome>>>,
    open_failures: RwLock<HashSet<CategoryId>>,
    calls: RwLock<Vec<MockCall>>,
    closed: RwLock<Vec<CategoryId>>,
    resets: AtomicUsize,
}

impl MockFeedSource {
    /// Create a mock source with no scripts (every extraction is `Empty`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a queue of outcomes for a category.
    pub fn with_script(
        self,
        category: impl Into<CategoryId>,
        outcomes: impl IntoIterator<Item = MockOutcome>,
    ) -> Self {
        self.scripts
            .write()
            .unwrap()
            .entry(category.into())
            .or_default()
            .extend(outcomes);
        self
    }

    /// Make `open` fail for a category until [`Self::allow_open`].
    pub fn with_open_failure(self, category: impl Into<CategoryId>) -> Self {
        self.open_failures.write().unwrap().insert(category.into());
        self
    }

    /// Append an outcome to a category's queue mid-run.
    pub fn push_outcome(&self, category: impl Into<CategoryId>, outcome: MockOutcome) {
        self.scripts
            .write()
            .unwrap()
            .entry(category.into())
            .or_default()
            .push_back(outcome);
    }

    /// Stop failing `open` for a category.
    pub fn allow_open(&self, category: &CategoryId) {
        self.open_failures.write().unwrap().remove(category);
    }

    /// All calls made to this mock, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.read().unwrap().clone()
    }

    /// Categories whose handles have been closed, in close order.
    pub fn closed_categories(&self) -> Vec<CategoryId> {
        self.closed.read().unwrap().clone()
    }

    /// Number of extractions performed for a category.
    pub fn extract_count(&self, category: &CategoryId) -> usize {
        self.calls
            .read()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, MockCall::Extract { category: cat } if cat == category))
            .count()
    }

    /// Number of backend resets.
    pub fn reset_count(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    fn track(&self, call: MockCall) {
        self.calls.write().unwrap().push(call);
    }
}

#[async_trait]
impl FeedSource for MockFeedSource {
    async fn open(&self, category: &CategoryId, _endpoint: &str) -> SourceResult<FeedHandle> {
        self.track(MockCall::Open {
            category: category.clone(),
        });

        if self.open_failures.read().unwrap().contains(category) {
            return Err(SourceError::Backend(format!(
                "scripted open failure for {category}"
            )));
        }

        Ok(FeedHandle::new(category.clone()))
    }

    async fn extract(&self, handle: &FeedHandle) -> SourceResult<Extraction> {
        let category = handle.category().clone();
        self.track(MockCall::Extract {
            category: category.clone(),
        });

        let outcome = self
            .scripts
            .write()
            .unwrap()
            .get_mut(&category)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(MockOutcome::Empty);

        match outcome {
            MockOutcome::Records(records) => Ok(Extraction::serving(records)),
            MockOutcome::Empty => Ok(Extraction::empty()),
            MockOutcome::Redirected => Ok(Extraction::redirected()),
            MockOutcome::Fail(message) => Err(SourceError::Backend(message)),
            MockOutcome::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }

    async fn close(&self, handle: FeedHandle) -> SourceResult<()> {
        self.track(MockCall::Close {
            category: handle.category().clone(),
        });
        self.closed.write().unwrap().push(handle.category().clone());
        Ok(())
    }

    async fn reset(&self) -> SourceResult<()> {
        self.track(MockCall::Reset);
        self.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Raw record with a priced match-winner market attached.
pub fn raw_with_odds(home: &str, away: &str, league: &str) -> RawRecord {
    RawRecord::new(home, away)
        .with_league(league)
        .with_market(Market::new("match winner", [("1", 1.85), ("X", 3.4), ("2", 4.2)]))
}
