//! Startup configuration.
//!
//! Settings come from environment variables (a `.env` file is loaded first by
//! `main`), the channel list from a JSON file:
//!
//! ```json
//! [{ "channelId": "UCxxxxxxxxxxxxxxxxxxxxxx", "webhook": "https://discord.com/api/webhooks/..." }]
//! ```
//!
//! Everything here is read once; errors are fatal and reported with context.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::detect::DEFAULT_PING;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 300_000;
pub const DEFAULT_CHANNELS_PATH: &str = "./Json/channels.json";
pub const DEFAULT_STORE_PATH: &str = ".data/store.json";

/// A monitored channel and where its announcements go.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub channel_id: String,
    pub webhook: String,
}

/// Process-wide settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub poll_interval: Duration,
    /// Mention token placed in every announcement.  May be empty.
    pub ping: String,
    pub channels_path: PathBuf,
    pub store_path: PathBuf,
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`, which returns the value of a variable
    /// if it is set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let poll_interval_ms = match lookup("POLL_INTERVAL_MS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("POLL_INTERVAL_MS is not a number: {raw:?}"))?,
            None => DEFAULT_POLL_INTERVAL_MS,
        };
        if poll_interval_ms == 0 {
            bail!("POLL_INTERVAL_MS must be greater than zero");
        }

        Ok(Self {
            poll_interval: Duration::from_millis(poll_interval_ms),
            // An empty DISCORD_PING is kept as-is to allow silent posts.
            ping: lookup("DISCORD_PING").unwrap_or_else(|| DEFAULT_PING.to_string()),
            channels_path: lookup("CHANNELS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CHANNELS_PATH)),
            store_path: lookup("STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH)),
        })
    }
}

/// Load and validate the channel list.
pub fn load_channels(path: &Path) -> Result<Vec<Channel>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("cannot read channel list {}", path.display()))?;
    parse_channels(&raw).with_context(|| format!("invalid channel list {}", path.display()))
}

/// Parse a channel list document, rejecting duplicate channel ids.
pub fn parse_channels(raw: &str) -> Result<Vec<Channel>> {
    let channels: Vec<Channel> = serde_json::from_str(raw)?;

    let mut seen = HashSet::new();
    for channel in &channels {
        if !seen.insert(channel.channel_id.as_str()) {
            bail!("channel {} is listed more than once", channel.channel_id);
        }
    }

    Ok(channels)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
