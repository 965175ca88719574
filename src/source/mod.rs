//! Feed transport layer.
//!
//! This module defines the [`FeedSource`] trait, the common [`FeedItem`]
//! type, and the [`YouTubeFeed`] implementation that the binary uses.
//! Parsing of the two wire formats lives in [`atom`] and [`rss`]; both are
//! pure functions over bytes so they can be tested without a network.
//!
//! ## For contributors: adding a new source
//!
//! 1. Create a new file in this directory.
//! 2. Define a struct and implement [`FeedSource`] for it.
//! 3. Add `mod` below and re-export your struct in the `pub use` block.
//! 4. Construct it in `main.rs` in place of `YouTubeFeed`.
//!
//! The poll loop, change detection and state tracking are source-agnostic.

mod atom;
mod feed_item;
mod rss;
mod youtube;

pub use feed_item::{FeedItem, LiveStatus};
pub use youtube::YouTubeFeed;

use thiserror::Error;

/// Everything that can go wrong while fetching or parsing one feed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed server answered {0}")]
    Status(reqwest::StatusCode),

    #[error("malformed atom feed: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed rss feed: {0}")]
    Rss(#[from] ::rss::Error),

    #[error("document is neither an atom nor an rss feed")]
    UnknownFormat,
}

/// Trait that every feed transport must implement.
///
/// The poll loop calls [`fetch()`](FeedSource::fetch) once per channel per
/// pass, sequentially, on the main thread.
pub trait FeedSource {
    /// Fetch the current entries for `channel_id`, newest first.
    ///
    /// An empty list is a valid answer and not an error.
    fn fetch(&self, channel_id: &str) -> Result<Vec<FeedItem>, FetchError>;
}
