//! Atom parsing for YouTube's native channel feed.
//!
//! Only the direct children of `<entry>` that the notifier needs are read:
//! `<id>`, `<title>`, `<published>` and `<yt:liveBroadcastContent>`.
//! Nested elements (e.g. `<media:group><media:title>`) are skipped so they
//! cannot shadow the entry's own fields.

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;

use super::FeedItem;

#[derive(Debug, Clone, Copy)]
enum Field {
    Id,
    Title,
    Published,
    LiveMarker,
}

impl Field {
    /// Match on the local name so namespace prefixes don't matter.
    fn from_local_name(name: &[u8]) -> Option<Self> {
        match name {
            b"id" => Some(Field::Id),
            b"title" => Some(Field::Title),
            b"published" => Some(Field::Published),
            b"liveBroadcastContent" => Some(Field::LiveMarker),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct RawEntry {
    id: Option<String>,
    title: Option<String>,
    published: Option<String>,
    live_marker: Option<String>,
}

impl RawEntry {
    fn push(&mut self, field: Field, text: &str) {
        let slot = match field {
            Field::Id => &mut self.id,
            Field::Title => &mut self.title,
            Field::Published => &mut self.published,
            Field::LiveMarker => &mut self.live_marker,
        };
        slot.get_or_insert_with(String::new).push_str(text);
    }

    fn finish(self) -> FeedItem {
        let published = self
            .published
            .as_deref()
            .and_then(|d| DateTime::parse_from_rfc3339(d.trim()).ok())
            .map(|dt| dt.with_timezone(&Utc));

        FeedItem::from_entry(
            self.id.as_deref().map(str::trim),
            self.title.as_deref(),
            self.live_marker.as_deref(),
            published,
        )
    }
}

/// Parse an Atom document into [`FeedItem`]s, in document order.
pub fn parse_feed(xml: &[u8]) -> Result<Vec<FeedItem>, quick_xml::Error> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut items = Vec::new();
    let mut entry: Option<RawEntry> = None;
    // Nesting level below the current <entry>.
    let mut depth = 0usize;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                if entry.is_none() {
                    if e.local_name().as_ref() == b"entry" {
                        entry = Some(RawEntry::default());
                        depth = 0;
                    }
                } else {
                    depth += 1;
                    field = if depth == 1 {
                        Field::from_local_name(e.local_name().as_ref())
                    } else {
                        None
                    };
                }
            }
            Event::Text(t) => {
                if let (Some(raw), Some(f)) = (entry.as_mut(), field) {
                    raw.push(f, &t.unescape()?);
                }
            }
            Event::CData(c) => {
                if let (Some(raw), Some(f)) = (entry.as_mut(), field) {
                    raw.push(f, &String::from_utf8_lossy(&c));
                }
            }
            Event::End(_) => {
                if entry.is_some() {
                    field = None;
                    if depth == 0 {
                        if let Some(raw) = entry.take() {
                            items.push(raw.finish());
                        }
                    } else {
                        depth -= 1;
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(items)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
