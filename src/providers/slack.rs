//! Slack incoming-webhook delivery.

use serde::Serialize;

use super::{NotificationMessage, NotificationProvider, ProviderError};

#[derive(Serialize)]
struct SlackPayload<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<&'a str>,
}

/// Posts to a single Slack incoming webhook URL.
pub struct SlackProvider {
    http: reqwest::Client,
    webhook_url: String,
    channel: Option<String>,
    /// When set, `send` always succeeds without making a network call.
    /// Used in tests and in environments with no real Slack workspace.
    stub: bool,
}

impl SlackProvider {
    /// Build a provider targeting one webhook URL, with an optional channel override.
    pub fn new(webhook_url: impl Into<String>, channel: Option<String>, stub: bool) -> Self {
        Self {
            http: reqwest::Client::new(),
            webhook_url: webhook_url.into(),
            channel,
            stub,
        }
    }
}

#[async_trait::async_trait]
impl NotificationProvider for SlackProvider {
    async fn send(&self, message: &NotificationMessage) -> Result<(), ProviderError> {
        if self.stub {
            return Ok(());
        }

        let payload = SlackPayload {
            text: &message.body,
            channel: self.channel.as_deref(),
        };

        let response = self
            .http
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProviderError::Transient(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(ProviderError::Transient(format!("slack responded {status}")));
        }
        Err(ProviderError::Permanent(format!("slack responded {status}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_mode_never_sends() {
        let provider = SlackProvider::new("https://hooks.slack.test/unreachable", None, true);
        let message = NotificationMessage {
            subject: "incident opened".into(),
            body: "cpu is critical".into(),
        };
        assert!(provider.send(&message).await.is_ok());
    }
}
