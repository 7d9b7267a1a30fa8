//! Core trait abstractions.
//!
//! The two seams to the outside world:
//!
//! - [`FeedSource`](source::FeedSource) - how raw records are fetched
//!   (browser automation, HTTP, fixtures, mocks)
//! - [`NameResolver`](resolver::NameResolver) - how raw entity names are
//!   canonicalized for stable record keys

pub mod resolver;
pub mod source;

pub use resolver::{DefaultResolver, NameResolver};
pub use source::{Extraction, FeedHandle, FeedSource, FeedStatus};
