//! RSS 2.0 parsing.
//!
//! Some mirrors and proxies re-publish channel uploads as RSS rather than
//! YouTube's native Atom.  This module converts an [`rss::Channel`] into
//! [`FeedItem`]s.

use chrono::{DateTime, Utc};

use super::FeedItem;

/// Namespace prefix and element name of the live-broadcast marker.
const YT_PREFIX: &str = "yt";
const LIVE_MARKER: &str = "liveBroadcastContent";

/// Parse an already-read [`rss::Channel`] into [`FeedItem`]s, in document
/// order.
pub fn parse_channel(channel: &rss::Channel) -> Vec<FeedItem> {
    channel
        .items()
        .iter()
        .map(|item| {
            // The composite id lives in <guid>; feeds without one carry it in <link>.
            let composite = item
                .guid()
                .map(|g| g.value())
                .or_else(|| item.link());

            let live_marker = item
                .extensions()
                .get(YT_PREFIX)
                .and_then(|ext| ext.get(LIVE_MARKER))
                .and_then(|values| values.first())
                .and_then(|ext| ext.value());

            // Only used for logging, so an unparsable date is simply dropped.
            let published = item
                .pub_date()
                .and_then(|d| DateTime::parse_from_rfc2822(d).ok())
                .map(|dt| dt.with_timezone(&Utc));

            FeedItem::from_entry(composite, item.title(), live_marker, published)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
