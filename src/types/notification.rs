//! Record of attempted and delivered notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ClientId, IncidentId, NotificationId};

/// The outbound channel a notification was (or will be) sent through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Slack incoming webhook.
    Slack,
    /// SMTP email.
    Email,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Provider::Slack => "slack",
            Provider::Email => "email",
        };
        write!(f, "{s}")
    }
}

/// The kind of event a notification describes, relevant to cooldown scoping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// First notification for a newly opened incident.
    Open,
    /// A reminder for an incident that remains open past cooldown.
    Reminder,
    /// A notification that an incident has resolved.
    Resolve,
}

/// Delivery status of a notification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    /// Logged before the outbound call; not yet resolved.
    Pending,
    /// Delivered successfully.
    Success,
    /// Delivery failed (transient-exhausted or permanent).
    Failed,
}

/// A row tracking one notification attempt.
///
/// Cooldown for a subject is computed from `MAX(sent_at) WHERE status=success`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationLog {
    /// Unique identifier.
    pub id: NotificationId,
    /// Owning tenant.
    pub client_id: ClientId,
    /// The incident this notification concerns, if any.
    pub incident_id: Option<IncidentId>,
    /// Channel used for delivery.
    pub provider: Provider,
    /// Kind of event being notified.
    pub kind: NotificationKind,
    /// Destination address or webhook URL (opaque to the log).
    pub recipient: String,
    /// Current delivery status.
    pub status: NotificationStatus,
    /// Time of successful delivery, if it occurred.
    pub sent_at: Option<DateTime<Utc>>,
    /// Time this log row was created.
    pub created_at: DateTime<Utc>,
    /// Error detail, set when status=failed.
    pub error: Option<String>,
    /// Number of delivery attempts made so far.
    pub attempts: u32,
}

impl NotificationLog {
    /// Construct a pending notification log row, inserted before the outbound call.
    pub fn pending(
        client_id: ClientId,
        incident_id: Option<IncidentId>,
        provider: Provider,
        kind: NotificationKind,
        recipient: impl Into<String>,
    ) -> Self {
        Self {
            id: NotificationId::new(),
            client_id,
            incident_id,
            provider,
            kind,
            recipient: recipient.into(),
            status: NotificationStatus::Pending,
            sent_at: None,
            created_at: Utc::now(),
            error: None,
            attempts: 0,
        }
    }

    /// Mark delivery successful.
    pub fn mark_success(&mut self) {
        self.status = NotificationStatus::Success;
        self.sent_at = Some(Utc::now());
        self.error = None;
    }

    /// Mark delivery failed with the given error detail.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = NotificationStatus::Failed;
        self.error = Some(error.into());
    }
}
