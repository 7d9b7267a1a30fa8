//! Name resolution trait for canonical record keys.
//!
//! Feeds spell the same team or league a dozen different ways, and spellings
//! shift when a session redirects. Record keys are derived from *canonical*
//! names so the same match keeps the same key across ticks and sessions.

use crate::types::record::CategoryId;

/// Resolves a raw entity name into its canonical key component.
///
/// Implementations must be pure: no side effects, and identical inputs
/// always produce identical output. Key stability across ticks depends
/// on this.
pub trait NameResolver: Send + Sync {
    /// Canonicalize a raw name, optionally using the category as a hint.
    fn canonical(&self, raw: &str, category: Option<&CategoryId>) -> String;
}

/// Default in-tree resolver: lowercase, strip punctuation, collapse
/// whitespace.
///
/// Good enough for fixtures and tests. Production deployments wire in a
/// resolver backed by a real alias table.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultResolver;

impl DefaultResolver {
    /// Create a new default resolver.
    pub fn new() -> Self {
        Self
    }
}

impl NameResolver for DefaultResolver {
    fn canonical(&self, raw: &str, _category: Option<&CategoryId>) -> String {
        let mut out = String::with_capacity(raw.len());
        let mut pending_space = false;

        for ch in raw.chars() {
            if ch.is_alphanumeric() {
                if pending_space && !out.is_empty() {
                    out.push(' ');
                }
                pending_space = false;
                for lower in ch.to_lowercase() {
                    out.push(lower);
                }
            } else {
                // Punctuation and whitespace both act as separators
                pending_space = true;
            }
        }

        out
    }
}
