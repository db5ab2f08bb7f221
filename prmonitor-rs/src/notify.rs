use std::time::Duration;

use reqwest::blocking::Client;
use serde::Serialize;
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("webhook request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("webhook returned {status}: {body}")]
    Status { status: u16, body: String },
}

pub trait Notifier {
    fn notify(&self, message: &str) -> Result<(), NotifyError>;
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct WebhookPayload<'a> {
    text: &'a str,
}

/// Posts messages to a chat incoming-webhook URL (Slack, Mattermost and
/// compatible services accept a `{"text": ...}` body).
pub struct WebhookNotifier {
    http: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, NotifyError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, message: &str) -> Result<(), NotifyError> {
        let response = self
            .http
            .post(&self.url)
            .json(&WebhookPayload { text: message })
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(NotifyError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shape() {
        let json = serde_json::to_value(WebhookPayload { text: "3 stale" }).unwrap();
        assert_eq!(json, serde_json::json!({ "text": "3 stale" }));
    }
}
