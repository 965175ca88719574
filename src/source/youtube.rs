//! YouTube channel feed source.
//!
//! Fetches `https://www.youtube.com/feeds/videos.xml?channel_id=<id>` with a
//! blocking [`reqwest`] client and hands the body to [`parse_feed`], which
//! accepts both Atom (what YouTube serves) and RSS 2.0.

use std::time::Duration;

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;

use super::{atom, rss, FeedItem, FeedSource, FetchError};

const FEED_URL_PREFIX: &str = "https://www.youtube.com/feeds/videos.xml?channel_id=";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Feed transport for YouTube channels.
pub struct YouTubeFeed {
    client: reqwest::blocking::Client,
    /// Everything before the channel id in the feed URL.
    url_prefix: String,
}

impl YouTubeFeed {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_url_prefix(FEED_URL_PREFIX)
    }

    /// A feed that requests `<url_prefix><channel_id>` instead of YouTube.
    pub fn with_url_prefix(url_prefix: impl Into<String>) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            url_prefix: url_prefix.into(),
        })
    }

    /// The feed URL for a channel id.
    pub fn feed_url(&self, channel_id: &str) -> String {
        format!("{}{channel_id}", self.url_prefix)
    }
}

impl FeedSource for YouTubeFeed {
    fn fetch(&self, channel_id: &str) -> Result<Vec<FeedItem>, FetchError> {
        let url = self.feed_url(channel_id);
        debug!(%url, "fetching feed");

        let response = self.client.get(&url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body = response.bytes()?;
        parse_feed(body.as_ref())
    }
}

/// Parse a feed document, picking the format from its root element.
///
/// This is a pure function (no I/O) so tests can exercise format detection
/// without hitting the network.
pub fn parse_feed(xml: &[u8]) -> Result<Vec<FeedItem>, FetchError> {
    match root_element(xml)?.as_deref() {
        Some(b"feed") => Ok(atom::parse_feed(xml)?),
        Some(b"rss") => {
            let channel = ::rss::Channel::read_from(xml)?;
            Ok(rss::parse_channel(&channel))
        }
        _ => Err(FetchError::UnknownFormat),
    }
}

/// Local name of the first element in the document, if any.
fn root_element(xml: &[u8]) -> Result<Option<Vec<u8>>, quick_xml::Error> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) => {
                return Ok(Some(e.local_name().as_ref().to_vec()));
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
        buf.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
