//! Record types: raw extraction output, keyed records, merge quality.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::traits::resolver::NameResolver;

/// Stable identifier for one monitored category (e.g. a sport code).
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CategoryId(String);

impl CategoryId {
    /// Create a category id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CategoryId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CategoryId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Deterministic key for one tracked record.
///
/// Derived from canonical identifying attributes, never from a
/// source-assigned numeric id - those are unstable across redirects and
/// sessions. Two sessions transitionally serving overlapping feeds will
/// derive the *same* key for the same match, which is what lets the merge
/// pass deduplicate them.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RecordKey(String);

impl RecordKey {
    /// Derive a key from canonical participant names.
    ///
    /// The category is deliberately not part of the key: during redirect
    /// overlap two sessions in different categories can report the same
    /// match, and they must collide here so the merger resolves them.
    pub fn derive(home_canonical: &str, away_canonical: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(home_canonical.as_bytes());
        hasher.update(b"|");
        hasher.update(away_canonical.as_bytes());
        let digest = hasher.finalize();
        Self(hex::encode(&digest[..8]))
    }

    /// Borrow the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Live score of a match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub home: u32,
    pub away: u32,
}

impl Score {
    /// Create a score.
    pub fn new(home: u32, away: u32) -> Self {
        Self { home, away }
    }

    /// True for the 0-0 placeholder feeds report before data arrives.
    pub fn is_blank(&self) -> bool {
        self.home == 0 && self.away == 0
    }
}

/// One priced selection within a market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    /// Selection label (e.g. "1", "X", "2", "over 2.5")
    pub name: String,

    /// Decimal odds
    pub odds: f64,
}

/// One betting market attached to a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    /// Market label (e.g. "match winner")
    pub name: String,

    /// Priced selections
    pub selections: Vec<Selection>,
}

impl Market {
    /// Create a market from (name, odds) pairs.
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        selections: impl IntoIterator<Item = (S, f64)>,
    ) -> Self {
        Self {
            name: name.into(),
            selections: selections
                .into_iter()
                .map(|(name, odds)| Selection {
                    name: name.into(),
                    odds,
                })
                .collect(),
        }
    }
}

/// Unkeyed record as produced by one extraction call.
///
/// Team names are raw feed spellings; the scheduler canonicalizes them
/// through the [`NameResolver`] before a key is derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Home participant, raw spelling
    pub home_team: String,

    /// Away participant, raw spelling
    pub away_team: String,

    /// League or competition label (may be empty)
    #[serde(default)]
    pub league: String,

    /// Current live score
    #[serde(default)]
    pub score: Score,

    /// Markets with odds (may be empty)
    #[serde(default)]
    pub markets: Vec<Market>,
}

impl RawRecord {
    /// Create a raw record with just the participants.
    pub fn new(home_team: impl Into<String>, away_team: impl Into<String>) -> Self {
        Self {
            home_team: home_team.into(),
            away_team: away_team.into(),
            league: String::new(),
            score: Score::default(),
            markets: Vec::new(),
        }
    }

    /// Set the league label.
    pub fn with_league(mut self, league: impl Into<String>) -> Self {
        self.league = league.into();
        self
    }

    /// Set the live score.
    pub fn with_score(mut self, home: u32, away: u32) -> Self {
        self.score = Score::new(home, away);
        self
    }

    /// Attach a market.
    pub fn with_market(mut self, market: Market) -> Self {
        self.markets.push(market);
        self
    }
}

/// Canonical payload of a tracked record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPayload {
    /// Home participant, canonical spelling
    pub home_team: String,

    /// Away participant, canonical spelling
    pub away_team: String,

    /// League or competition label
    pub league: String,

    /// Current live score
    pub score: Score,

    /// Markets with odds
    pub markets: Vec<Market>,
}

/// Merge priority derived from payload completeness.
///
/// Field order is the comparison order: markets beat score beats league.
/// Derived `Ord` compares lexicographically, so the ordering is
/// deterministic regardless of which duplicate arrived first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quality {
    /// Has at least one priced market
    pub has_markets: bool,

    /// Has a non-placeholder score
    pub has_score: bool,

    /// Has a non-empty league label
    pub has_league: bool,
}

/// One logical tracked entity (e.g. one live match).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Deterministic key (see [`RecordKey::derive`])
    pub key: RecordKey,

    /// Category the winning session reported this record under
    pub category: CategoryId,

    /// Canonical payload
    pub payload: MatchPayload,

    /// First tick this key entered the store
    pub first_seen: DateTime<Utc>,

    /// Last tick the payload changed
    pub last_updated: DateTime<Utc>,
}

impl Record {
    /// Build a keyed record from raw extraction output.
    pub fn from_raw<R: NameResolver + ?Sized>(
        category: &CategoryId,
        raw: RawRecord,
        resolver: &R,
        now: DateTime<Utc>,
    ) -> Self {
        let home = resolver.canonical(&raw.home_team, Some(category));
        let away = resolver.canonical(&raw.away_team, Some(category));
        let key = RecordKey::derive(&home, &away);

        Self {
            key,
            category: category.clone(),
            payload: MatchPayload {
                home_team: home,
                away_team: away,
                league: raw.league,
                score: raw.score,
                markets: raw.markets,
            },
            first_seen: now,
            last_updated: now,
        }
    }

    /// Merge priority of this record's payload.
    pub fn quality(&self) -> Quality {
        Quality {
            has_markets: !self.payload.markets.is_empty(),
            has_score: !self.payload.score.is_blank(),
            has_league: !self.payload.league.trim().is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::resolver::DefaultResolver;

    #[test]
    fn test_key_is_stable_across_spellings() {
        let resolver = DefaultResolver::new();
        let category = CategoryId::new("soccer");
        let now = Utc::now();

        let a = Record::from_raw(
            &category,
            RawRecord::new("Real  Madrid", "F.C. Barcelona"),
            &resolver,
            now,
        );
        let b = Record::from_raw(
            &category,
            RawRecord::new("real madrid", "FC Barcelona"),
            &resolver,
            now,
        );

        // "F.C." and "FC" normalize differently ("f c" vs "fc"), so only
        // the home side is guaranteed equal here
        assert_eq!(a.payload.home_team, b.payload.home_team);

        let c = Record::from_raw(
            &category,
            RawRecord::new("REAL MADRID", "F.C. Barcelona"),
            &resolver,
            now,
        );
        assert_eq!(a.key, c.key);
    }

    #[test]
    fn test_key_ignores_category() {
        let key_a = RecordKey::derive("team one", "team two");
        let key_b = RecordKey::derive("team one", "team two");
        assert_eq!(key_a, key_b);
        assert_eq!(key_a.as_str().len(), 16);
    }

    #[test]
    fn test_quality_ordering() {
        let with_markets = Quality {
            has_markets: true,
            has_score: false,
            has_league: false,
        };
        let with_score_and_league = Quality {
            has_markets: false,
            has_score: true,
            has_league: true,
        };
        // Markets outrank everything else
        assert!(with_markets > with_score_and_league);

        let score_only = Quality {
            has_markets: false,
            has_score: true,
            has_league: false,
        };
        let league_only = Quality {
            has_markets: false,
            has_score: false,
            has_league: true,
        };
        assert!(score_only > league_only);
    }

    #[test]
    fn test_record_quality_from_payload() {
        let resolver = DefaultResolver::new();
        let category = CategoryId::new("soccer");
        let now = Utc::now();

        let bare = Record::from_raw(
            &category,
            RawRecord::new("A", "B"),
            &resolver,
            now,
        );
        assert_eq!(
            bare.quality(),
            Quality {
                has_markets: false,
                has_score: false,
                has_league: false
            }
        );

        let rich = Record::from_raw(
            &category,
            RawRecord::new("A", "B")
                .with_league("Premier League")
                .with_score(1, 0)
                .with_market(Market::new("match winner", [("1", 1.5), ("2", 2.6)])),
            &resolver,
            now,
        );
        assert_eq!(
            rich.quality(),
            Quality {
                has_markets: true,
                has_score: true,
                has_league: true
            }
        );
    }

    #[test]
    fn test_score_blank_detection() {
        assert!(Score::new(0, 0).is_blank());
        assert!(!Score::new(0, 1).is_blank());
    }
}
