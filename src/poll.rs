//! The poll loop.
//!
//! A [`Poller`] owns everything one pass needs: the channel list, the feed
//! transport, the webhook notifier and the state store.  [`Poller::run_pass`]
//! walks the channels in order and, for each one, fetches, detects, notifies
//! and commits.  [`Poller::run`] repeats passes forever on the calling thread.
//!
//! ## For contributors
//!
//! The loop is intentionally simple: channels are handled one after another
//! and a pass only starts once the previous one has finished.  A failure on
//! one channel is logged and never stops the rest of the pass.
//!
//! The state for a channel only moves forward after the webhook accepted the
//! announcement.  If delivery fails the same item is seen as new on the next
//! pass and announced again, so a crash or an outage can cause a repeat but
//! never a silent miss.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, info_span, warn};

use crate::config::Channel;
use crate::detect::{detect, Action};
use crate::notify::{Notifier, WebhookPayload};
use crate::source::FeedSource;
use crate::store::{channel_key, StateStore};

/// What happened to one channel during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Feed had no entries.
    Empty,
    /// Newest entry was already announced.
    Unchanged,
    /// Announcement delivered and state committed.
    Notified,
    /// Announcement delivered but the state could not be saved.
    CommitFailed,
    /// Fetch, state read, or delivery failed; state untouched.
    Failed,
}

/// Tally of a single pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassReport {
    pub checked: usize,
    pub notified: usize,
    pub unchanged: usize,
    pub empty: usize,
    pub failed: usize,
}

impl PassReport {
    fn record(&mut self, outcome: Outcome) {
        self.checked += 1;
        match outcome {
            Outcome::Empty => self.empty += 1,
            Outcome::Unchanged => self.unchanged += 1,
            Outcome::Notified => self.notified += 1,
            Outcome::CommitFailed | Outcome::Failed => self.failed += 1,
        }
    }
}

pub struct Poller<F, N, S> {
    channels: Vec<Channel>,
    feed: F,
    notifier: N,
    store: S,
    ping: String,
}

impl<F, N, S> Poller<F, N, S>
where
    F: FeedSource,
    N: Notifier,
    S: StateStore,
{
    pub fn new(channels: Vec<Channel>, feed: F, notifier: N, store: S, ping: impl Into<String>) -> Self {
        Self {
            channels,
            feed,
            notifier,
            store,
            ping: ping.into(),
        }
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[cfg(test)]
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Check every channel once, in configuration order.
    pub fn run_pass(&mut self) -> PassReport {
        let mut report = PassReport::default();

        // Taken for the pass so each channel can be borrowed alongside `&mut self`.
        let channels = std::mem::take(&mut self.channels);
        for channel in &channels {
            let span = info_span!("channel", id = %channel.channel_id);
            let _enter = span.enter();

            report.record(self.check_channel(channel));
        }
        self.channels = channels;

        info!(
            checked = report.checked,
            notified = report.notified,
            unchanged = report.unchanged,
            empty = report.empty,
            failed = report.failed,
            "pass complete"
        );
        report
    }

    fn check_channel(&mut self, channel: &Channel) -> Outcome {
        let items = match self.feed.fetch(&channel.channel_id) {
            Ok(items) => items,
            Err(e) => {
                error!(error = %e, "failed to fetch feed");
                return Outcome::Failed;
            }
        };

        let Some(latest) = items.first() else {
            debug!("feed has no entries");
            return Outcome::Empty;
        };

        let key = channel_key(&channel.channel_id);
        let stored = match self.store.get(&key) {
            Ok(stored) => stored,
            Err(e) => {
                error!(error = %e, "failed to read stored state");
                return Outcome::Failed;
            }
        };

        let (message, item_id) = match detect(Some(latest), stored.as_deref(), &self.ping) {
            Action::None => {
                info!(last = stored.as_deref().unwrap_or_default(), "no new video");
                return Outcome::Unchanged;
            }
            Action::Notify { message, item_id } => (message, item_id),
        };

        let payload = WebhookPayload::new(message);
        if let Err(e) = self.notifier.send(&channel.webhook, &payload) {
            error!(error = %e, video = %item_id, "failed to deliver announcement, will retry next pass");
            return Outcome::Failed;
        }

        if let Err(e) = self.store.set(&key, &item_id) {
            warn!(error = %e, video = %item_id, "announcement sent but state not saved");
            return Outcome::CommitFailed;
        }

        info!(
            video = %item_id,
            title = %latest.title,
            status = %latest.live_status,
            published = ?latest.published,
            "posted new video"
        );
        Outcome::Notified
    }

    /// Run passes forever: one immediately, then one every `interval`,
    /// measured from the start of each pass.  A pass that overruns the
    /// interval is followed by the next one right away.
    pub fn run(&mut self, interval: Duration) -> ! {
        loop {
            let started = Instant::now();
            self.run_pass();

            let elapsed = started.elapsed();
            match wait_before_next_pass(interval, elapsed) {
                Some(wait) => thread::sleep(wait),
                None => warn!(?elapsed, ?interval, "pass took longer than the poll interval"),
            }
        }
    }
}

/// How long to sleep after a pass that took `elapsed` so that passes start
/// `interval` apart.  `None` when the pass overran and the next one is due.
fn wait_before_next_pass(interval: Duration, elapsed: Duration) -> Option<Duration> {
    interval.checked_sub(elapsed).filter(|wait| !wait.is_zero())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::*;
    use crate::notify::NotifyError;
    use crate::source::{FeedItem, FetchError};
    use crate::store::MemoryStore;

    /// Feed fake: per-channel canned answers; unknown channels fail.
    #[derive(Default)]
    struct FakeFeed {
        answers: HashMap<String, Vec<FeedItem>>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeFeed {
        fn with(mut self, channel: &str, items: Vec<FeedItem>) -> Self {
            self.answers.insert(channel.to_string(), items);
            self
        }
    }

    impl FeedSource for FakeFeed {
        fn fetch(&self, channel_id: &str) -> Result<Vec<FeedItem>, FetchError> {
            self.calls.borrow_mut().push(channel_id.to_string());
            self.answers
                .get(channel_id)
                .cloned()
                .ok_or(FetchError::UnknownFormat)
        }
    }

    /// Notifier fake that records every attempt.
    #[derive(Default)]
    struct FakeNotifier {
        sent: RefCell<Vec<(String, WebhookPayload)>>,
        failing: RefCell<bool>,
    }

    impl Notifier for FakeNotifier {
        fn send(&self, target: &str, payload: &WebhookPayload) -> Result<(), NotifyError> {
            self.sent
                .borrow_mut()
                .push((target.to_string(), payload.clone()));
            if *self.failing.borrow() {
                return Err(NotifyError::Status {
                    status: reqwest::StatusCode::BAD_GATEWAY,
                    body: String::new(),
                });
            }
            Ok(())
        }
    }

    fn channel(id: &str) -> Channel {
        Channel {
            channel_id: id.to_string(),
            webhook: format!("https://hooks.example.com/{id}"),
        }
    }

    fn video(composite: &str, marker: Option<&str>) -> FeedItem {
        FeedItem::from_entry(Some(composite), Some("A title"), marker, None)
    }

    fn build(channels: &[&str], feed: FakeFeed) -> Poller<FakeFeed, FakeNotifier, MemoryStore> {
        Poller::new(
            channels.iter().map(|id| channel(id)).collect(),
            feed,
            FakeNotifier::default(),
            MemoryStore::new(),
            "@everyone",
        )
    }

    #[test]
    fn end_to_end_new_video_then_idle() {
        let feed = FakeFeed::default().with("S", vec![video("yt:video:xyz", Some("none"))]);
        let mut poller = build(&["S"], feed);
        poller.store_mut().set(&channel_key("S"), "abc").unwrap();
        let writes_before = poller.store().writes;

        let report = poller.run_pass();
        assert_eq!(report.notified, 1);

        {
            let sent = poller.notifier.sent.borrow();
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0].0, "https://hooks.example.com/S");
            assert_eq!(
                sent[0].1.content,
                "*|| @everyone || A new video is live!* https://youtu.be/xyz"
            );
            assert_eq!(sent[0].1.username, "YouTube Notifier");
        }
        assert_eq!(
            poller.store().get(&channel_key("S")).unwrap().as_deref(),
            Some("xyz")
        );

        // Same feed again: nothing sent, nothing written.
        let report = poller.run_pass();
        assert_eq!(report.unchanged, 1);
        assert_eq!(poller.notifier.sent.borrow().len(), 1);
        assert_eq!(poller.store().writes, writes_before + 1);
    }

    #[test]
    fn dispatch_failure_keeps_state_and_retries() {
        let feed = FakeFeed::default().with("S", vec![video("yt:video:x", None)]);
        let mut poller = build(&["S"], feed);
        poller.store_mut().set(&channel_key("S"), "old").unwrap();
        *poller.notifier.failing.borrow_mut() = true;

        let report = poller.run_pass();
        assert_eq!(report.failed, 1);
        assert_eq!(
            poller.store().get(&channel_key("S")).unwrap().as_deref(),
            Some("old")
        );

        *poller.notifier.failing.borrow_mut() = false;
        let report = poller.run_pass();
        assert_eq!(report.notified, 1);
        assert_eq!(poller.notifier.sent.borrow().len(), 2, "one retry, not more");
        assert_eq!(
            poller.store().get(&channel_key("S")).unwrap().as_deref(),
            Some("x")
        );
    }

    #[test]
    fn fetch_failure_does_not_stop_later_channels() {
        // "broken" has no canned answer, so its fetch fails.
        let feed = FakeFeed::default().with("ok", vec![video("yt:video:v1", None)]);
        let mut poller = build(&["broken", "ok"], feed);

        let report = poller.run_pass();
        assert_eq!(report.checked, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.notified, 1);
        assert_eq!(*poller.feed.calls.borrow(), vec!["broken", "ok"]);
        assert_eq!(poller.store().get(&channel_key("broken")).unwrap(), None);
    }

    #[test]
    fn empty_feed_is_a_no_op() {
        let feed = FakeFeed::default().with("S", Vec::new());
        let mut poller = build(&["S"], feed);

        let report = poller.run_pass();
        assert_eq!(report.empty, 1);
        assert!(poller.notifier.sent.borrow().is_empty());
        assert_eq!(poller.store().writes, 0);
    }

    #[test]
    fn first_sighting_is_announced() {
        let feed = FakeFeed::default().with("S", vec![video("yt:video:first", Some("upcoming"))]);
        let mut poller = build(&["S"], feed);

        poller.run_pass();
        let sent = poller.notifier.sent.borrow();
        assert!(sent[0].1.content.contains("Upcoming livestream scheduled!"));
    }

    #[test]
    fn only_the_newest_entry_matters() {
        let feed = FakeFeed::default().with(
            "S",
            vec![video("yt:video:new", Some("live")), video("yt:video:old", None)],
        );
        let mut poller = build(&["S"], feed);
        poller.store_mut().set(&channel_key("S"), "old").unwrap();

        poller.run_pass();
        let sent = poller.notifier.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.content.ends_with("https://youtu.be/new"));
        assert!(sent[0].1.content.contains("A livestream just started!"));
    }

    #[test]
    fn channels_do_not_share_state() {
        let feed = FakeFeed::default()
            .with("A", vec![video("yt:video:a1", None)])
            .with("AB", vec![video("yt:video:a1", None)]);
        let mut poller = build(&["A", "AB"], feed);

        let report = poller.run_pass();
        assert_eq!(report.notified, 2, "same video id on two channels is two announcements");
        assert_eq!(poller.store().get(&channel_key("A")).unwrap().as_deref(), Some("a1"));
        assert_eq!(poller.store().get(&channel_key("AB")).unwrap().as_deref(), Some("a1"));
    }

    #[test]
    fn state_read_failure_skips_channel_without_notifying() {
        let feed = FakeFeed::default()
            .with("S", vec![video("yt:video:x", None)])
            .with("T", vec![video("yt:video:y", None)]);
        let mut poller = build(&["S", "T"], feed);
        poller.store_mut().fail_reads = true;

        let report = poller.run_pass();
        assert_eq!(report.checked, 2);
        assert_eq!(report.failed, 2);
        assert!(poller.notifier.sent.borrow().is_empty());
        assert_eq!(poller.store().writes, 0);
        assert_eq!(*poller.feed.calls.borrow(), vec!["S", "T"]);

        poller.store_mut().fail_reads = false;
        assert_eq!(poller.run_pass().notified, 2);
    }

    #[test]
    fn read_failure_is_a_failed_outcome() {
        let feed = FakeFeed::default().with("S", vec![video("yt:video:x", None)]);
        let mut poller = build(&["S"], feed);
        poller.store_mut().fail_reads = true;

        let outcome = poller.check_channel(&channel("S"));
        assert_eq!(outcome, Outcome::Failed);
        assert!(poller.notifier.sent.borrow().is_empty());
    }

    #[test]
    fn channel_list_survives_a_pass() {
        let feed = FakeFeed::default().with("S", vec![video("yt:video:x", None)]);
        let mut poller = build(&["S"], feed);

        poller.run_pass();
        poller.run_pass();
        assert_eq!(*poller.feed.calls.borrow(), vec!["S", "S"]);
    }

    #[test]
    fn short_pass_waits_out_the_rest_of_the_interval() {
        assert_eq!(
            wait_before_next_pass(Duration::from_secs(300), Duration::from_secs(20)),
            Some(Duration::from_secs(280))
        );
    }

    #[test]
    fn overrunning_pass_starts_the_next_one_immediately() {
        let interval = Duration::from_secs(300);
        assert_eq!(wait_before_next_pass(interval, Duration::from_secs(301)), None);
        assert_eq!(wait_before_next_pass(interval, interval), None);
    }

    #[test]
    fn commit_failure_is_retried_next_pass() {
        let feed = FakeFeed::default().with("S", vec![video("yt:video:v", None)]);
        let mut poller = build(&["S"], feed);
        poller.store_mut().fail_writes = true;

        let report = poller.run_pass();
        assert_eq!(report.failed, 1);
        assert_eq!(poller.store().get(&channel_key("S")).unwrap(), None);

        poller.store_mut().fail_writes = false;
        poller.run_pass();
        assert_eq!(poller.notifier.sent.borrow().len(), 2);
        assert_eq!(poller.store().get(&channel_key("S")).unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn works_against_the_json_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = crate::store::JsonFileStore::open(dir.path().join("store.json")).unwrap();
        let feed = FakeFeed::default().with("S", vec![video("yt:video:xyz", None)]);
        let mut poller = Poller::new(
            vec![channel("S")],
            feed,
            FakeNotifier::default(),
            store,
            "",
        );

        assert_eq!(poller.run_pass().notified, 1);
        assert_eq!(poller.run_pass().unchanged, 1);
        assert_eq!(
            poller.notifier.sent.borrow()[0].1.content,
            "*||  || A new video is live!* https://youtu.be/xyz"
        );
    }
}
