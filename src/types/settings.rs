//! Per-client notification and evaluation configuration.

use serde::{Deserialize, Serialize};

use super::ids::ClientId;

/// Per-tenant settings governing evaluation gating and notification delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSettings {
    /// The owning tenant (also the primary key).
    pub client_id: ClientId,
    /// Destination email address for notifications. Empty disables the channel.
    pub notification_email: String,
    /// Slack incoming webhook URL. Empty disables the channel.
    pub slack_webhook_url: String,
    /// Slack channel name override, if set.
    pub slack_channel_name: Option<String>,
    /// Seconds a CRITICAL must persist before an incident opens. 0 opens immediately.
    pub grace_period_seconds: u64,
    /// Minimum seconds between reminder notifications for an open incident.
    /// 0 means no cooldown (every notify fires). Absence of override falls
    /// back to the process-wide default.
    pub reminder_notification_seconds: u64,
    /// Whether related alerts should be grouped in notification text.
    pub alert_grouping_enabled: bool,
    /// Whether a resolve notification is sent when an incident closes.
    pub notify_on_resolve: bool,
    /// Minutes of silence from a machine before its heartbeat goes CRITICAL.
    pub heartbeat_threshold_minutes: i64,
    /// Consecutive CRITICAL evaluations required before opening, if set.
    pub consecutive_failures_threshold: Option<u32>,
}

impl ClientSettings {
    /// Construct default settings for a newly provisioned client.
    pub fn defaults_for(client_id: ClientId) -> Self {
        Self {
            client_id,
            notification_email: String::new(),
            slack_webhook_url: String::new(),
            slack_channel_name: None,
            grace_period_seconds: 0,
            reminder_notification_seconds: 0,
            alert_grouping_enabled: false,
            notify_on_resolve: true,
            heartbeat_threshold_minutes: 10,
            consecutive_failures_threshold: None,
        }
    }

    /// Whether the Slack channel is configured.
    pub fn slack_enabled(&self) -> bool {
        !self.slack_webhook_url.trim().is_empty()
    }

    /// Whether the email channel is configured.
    pub fn email_enabled(&self) -> bool {
        !self.notification_email.trim().is_empty()
    }

    /// Whether at least one notification channel is configured.
    pub fn any_channel_enabled(&self) -> bool {
        self.slack_enabled() || self.email_enabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_no_channel_enabled() {
        let settings = ClientSettings::defaults_for(ClientId::new());
        assert!(!settings.any_channel_enabled());
    }

    #[test]
    fn channel_enabled_tracks_non_empty_fields() {
        let mut settings = ClientSettings::defaults_for(ClientId::new());
        settings.slack_webhook_url = "https://hooks.slack.test/x".into();
        assert!(settings.any_channel_enabled());
        assert!(settings.slack_enabled());
        assert!(!settings.email_enabled());
    }
}
