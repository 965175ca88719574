//! yt-webhook-notifier: announces new YouTube uploads and livestreams to a
//! webhook.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌──────────┐  fetch()  ┌───────────┐  Action  ┌───────────┐
//! │ source/  │ ────────► │  poll.rs  │ ───────► │ notify.rs │
//! │ (feeds)  │           │  (loop)   │          │ (webhook) │
//! └──────────┘           └───────────┘          └───────────┘
//!                          │       ▲
//!               detect()   │       │  get() / set()
//!                          ▼       ▼
//!                  ┌───────────┐ ┌──────────┐
//!                  │ detect.rs │ │ store.rs │
//!                  │  (pure)   │ │  (JSON)  │
//!                  └───────────┘ └──────────┘
//! ```
//!
//! * **`source/`**: the `FeedSource` trait, Atom/RSS parsing and the YouTube
//!   transport.
//! * **`detect`**: decides whether the newest entry needs an announcement.
//! * **`notify`**: posts announcements to a webhook.
//! * **`store`**: the JSON state file of last announced ids.
//! * **`poll`**: runs passes over all channels on a fixed interval.
//! * **`config`**: environment settings and the channel list.
//! * **`main`**: wires everything together.

mod config;
mod detect;
mod notify;
mod poll;
mod source;
mod store;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use config::Settings;
use notify::WebhookNotifier;
use poll::Poller;
use source::YouTubeFeed;
use store::JsonFileStore;

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    // -- configuration -------------------------------------------------------
    let mut settings = Settings::from_env()?;
    // The first argument, if any, points at the channel list.
    if let Some(path) = std::env::args().nth(1) {
        settings.channels_path = PathBuf::from(path);
    }

    let channels = config::load_channels(&settings.channels_path)?;
    info!(
        channels = channels.len(),
        interval_ms = settings.poll_interval.as_millis() as u64,
        "yt-webhook-notifier starting"
    );

    // -- collaborators -------------------------------------------------------
    let store = JsonFileStore::open(&settings.store_path)
        .with_context(|| format!("cannot open state file {}", settings.store_path.display()))?;
    info!(path = %store.path().display(), "state file ready");
    let feed = YouTubeFeed::new().context("cannot build feed client")?;
    let notifier = WebhookNotifier::new().context("cannot build webhook client")?;

    // -- poll forever ----------------------------------------------------------
    let mut poller = Poller::new(channels, feed, notifier, store, settings.ping);
    poller.run(settings.poll_interval)
}
