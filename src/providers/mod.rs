//! Outbound delivery channels. Each provider classifies its own failures
//! into transient (worth retrying) vs permanent, since only the provider
//! knows what its status codes/SMTP replies mean.

pub mod slack;
pub mod smtp;

pub use slack::SlackProvider;
pub use smtp::SmtpProvider;

/// A message ready to hand to a channel, already rendered to plain text.
#[derive(Debug, Clone)]
pub struct NotificationMessage {
    /// Subject line, used by the email provider and ignored by Slack.
    pub subject: String,
    /// Rendered body text.
    pub body: String,
}

/// A failure from an outbound provider call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// Worth retrying: connection failure, timeout, 429/5xx.
    #[error("transient provider failure: {0}")]
    Transient(String),
    /// Retrying will not help: bad webhook, rejected recipient, 4xx auth failure.
    #[error("permanent provider failure: {0}")]
    Permanent(String),
}

/// A channel capable of delivering a rendered notification.
#[async_trait::async_trait]
pub trait NotificationProvider: Send + Sync {
    /// Send the message, classifying any failure as transient or permanent.
    async fn send(&self, message: &NotificationMessage) -> Result<(), ProviderError>;
}
