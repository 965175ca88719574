//! Webhook delivery.
//!
//! Announcements are posted as `{"content": ..., "username": ...}`, the
//! minimal Discord webhook body.  Any transport error or non-2xx answer is
//! returned to the caller; the poll loop relies on that to skip the state
//! commit and retry on the next pass.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Display name the webhook posts under.
pub const WEBHOOK_USERNAME: &str = "YouTube Notifier";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// JSON body sent to the webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookPayload {
    pub content: String,
    pub username: String,
}

impl WebhookPayload {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            username: WEBHOOK_USERNAME.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook answered {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Delivers a payload to a target address.
pub trait Notifier {
    fn send(&self, target: &str, payload: &WebhookPayload) -> Result<(), NotifyError>;
}

/// Blocking HTTP webhook client.
pub struct WebhookNotifier {
    client: reqwest::blocking::Client,
}

impl WebhookNotifier {
    pub fn new() -> Result<Self, NotifyError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

impl Notifier for WebhookNotifier {
    fn send(&self, target: &str, payload: &WebhookPayload) -> Result<(), NotifyError> {
        let response = self.client.post(target).json(payload).send()?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().unwrap_or_default();
        Err(NotifyError::Status { status, body })
    }
}
