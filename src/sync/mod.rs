//! Repository sync from remote feeds.
//!
//! - [`manifest`] - Manifest format and parsing
//! - [`feed`] - The [`RemoteFeed`] fetch primitive and its HTTP implementation
//! - [`engine`] - [`SyncWork`], the task that materializes a new repository version

mod engine;
mod feed;
mod manifest;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use engine::SyncWork;
pub use feed::{FeedSource, HttpFeed, RemoteFeed};
pub use manifest::{ManifestEntry, parse_manifest};
