//! The normalised feed entry every source produces.
//!
//! `FeedItem` is the only thing the change detector looks at.  Source
//! implementations (Atom, RSS) convert their native entries into `FeedItem`s
//! so the poll loop stays format-agnostic.
//!
//! ## For contributors
//!
//! A new feed format only needs to fill in these fields.  Use
//! [`extract_item_id`] on whatever composite identifier the format carries so
//! that ids stay comparable with what is already in the state file.

use chrono::{DateTime, Utc};

/// Broadcast state of a feed entry.
///
/// Parsed from the `yt:liveBroadcastContent` marker.  Anything other than
/// `live` or `upcoming` (including a missing marker) is [`LiveStatus::None`].
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum LiveStatus {
    /// A livestream that is on air right now.
    Live,
    /// A livestream scheduled for later.
    Upcoming,
    /// A regular upload.
    #[default]
    None,
}

impl LiveStatus {
    /// Classify a raw marker value.  Never fails.
    pub fn from_marker(marker: Option<&str>) -> Self {
        match marker.map(str::trim) {
            Some("live") => LiveStatus::Live,
            Some("upcoming") => LiveStatus::Upcoming,
            _ => LiveStatus::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LiveStatus::Live => "live",
            LiveStatus::Upcoming => "upcoming",
            LiveStatus::None => "none",
        }
    }
}

impl std::fmt::Display for LiveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single feed entry, normalised from any source format.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FeedItem {
    /// Canonical item id (e.g. the YouTube video id).
    ///
    /// May be empty when the feed carried no usable identifier.  The empty
    /// string is still compared like any other id.
    pub id: String,

    /// Human-readable title.
    pub title: String,

    /// Broadcast state, selects the announcement wording.
    pub live_status: LiveStatus,

    /// Publication timestamp, only used for logging.
    pub published: Option<DateTime<Utc>>,
}

impl FeedItem {
    /// Build an item from the raw parts a feed entry carries.
    ///
    /// `composite_id` is reduced with [`extract_item_id`] and a missing title
    /// becomes `"(untitled)"`.
    pub fn from_entry(
        composite_id: Option<&str>,
        title: Option<&str>,
        live_marker: Option<&str>,
        published: Option<DateTime<Utc>>,
    ) -> Self {
        FeedItem {
            id: extract_item_id(composite_id),
            title: title.unwrap_or("(untitled)").to_string(),
            live_status: LiveStatus::from_marker(live_marker),
            published,
        }
    }

    /// Public watch URL for this item.
    pub fn url(&self) -> String {
        item_url(&self.id)
    }
}

/// Reduce a composite entry id such as `yt:video:dQw4w9WgXcQ` to its final
/// colon-delimited segment.
///
/// An absent or empty composite yields `""`.
pub fn extract_item_id(composite: Option<&str>) -> String {
    composite
        .unwrap_or_default()
        .rsplit(':')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Short watch URL for a video id.
pub fn item_url(id: &str) -> String {
    format!("https://youtu.be/{id}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
