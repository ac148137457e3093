//! Notifier: resolves recipients, enforces reminder cooldown, and dispatches
//! through whichever channels a client has configured, retrying transient
//! provider failures with jittered exponential backoff.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use rand::Rng;

use crate::config::Config;
use crate::error::AppError;
use crate::providers::{NotificationMessage, NotificationProvider, ProviderError, SlackProvider, SmtpProvider};
use crate::store::Store;
use crate::types::{ClientSettings, Incident, NotificationKind, NotificationLog, Provider, Subject};

/// A dispatch request produced by the incident manager.
#[derive(Debug, Clone)]
pub struct NotifyIntent {
    /// Which event this notification describes.
    pub kind: NotificationKind,
    /// The incident it concerns.
    pub incident: Incident,
}

impl NotifyIntent {
    /// The first notification for a newly opened incident.
    pub fn open(incident: Incident) -> Self {
        Self { kind: NotificationKind::Open, incident }
    }
    /// A reminder for an incident re-observed while already open.
    pub fn reminder(incident: Incident) -> Self {
        Self { kind: NotificationKind::Reminder, incident }
    }
    /// A notification that an incident has resolved.
    pub fn resolve(incident: Incident) -> Self {
        Self { kind: NotificationKind::Resolve, incident }
    }
}

/// Dispatches notifications, coalescing concurrent attempts for the same
/// subject and honoring each client's reminder cooldown.
pub struct Notifier {
    config: Arc<Config>,
    in_flight: Mutex<HashSet<String>>,
}

impl Notifier {
    /// Build a notifier against the process configuration.
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Dispatch one notify intent. A second call for the same subject while
    /// the first is still in flight is a silent no-op.
    pub async fn dispatch(&self, store: &dyn Store, intent: NotifyIntent) -> Result<(), AppError> {
        let key = intent.incident.subject().canonical_key();
        if !self.in_flight.lock().insert(key.clone()) {
            return Ok(());
        }
        let result = self.dispatch_inner(store, &intent).await;
        self.in_flight.lock().remove(&key);
        result
    }

    async fn dispatch_inner(&self, store: &dyn Store, intent: &NotifyIntent) -> Result<(), AppError> {
        let settings = store
            .get_settings(intent.incident.client_id)
            .await
            .map_err(|e| AppError::Transient(e.to_string()))?;

        if !settings.any_channel_enabled() {
            return Ok(());
        }

        if intent.kind == NotificationKind::Reminder {
            let cooldown = reminder_cooldown_secs(&settings, &self.config);
            if cooldown > 0 {
                let subject = intent.incident.subject();
                let last = last_contact(store, subject).await.map_err(|e| AppError::Transient(e.to_string()))?;
                if let Some(last) = last {
                    let elapsed = (Utc::now() - last).num_seconds().max(0) as u64;
                    if elapsed < cooldown {
                        return Ok(());
                    }
                }
            }
        }

        let message = render(intent);

        if settings.slack_enabled() {
            self.send_channel(store, intent, &settings, Provider::Slack, &message).await?;
        }
        if settings.email_enabled() {
            if self.config.smtp.is_some() {
                self.send_channel(store, intent, &settings, Provider::Email, &message).await?;
            } else {
                tracing::warn!(client_id = %intent.incident.client_id, "email channel configured but SMTP is not");
            }
        }
        Ok(())
    }

    async fn send_channel(
        &self,
        store: &dyn Store,
        intent: &NotifyIntent,
        settings: &ClientSettings,
        provider_kind: Provider,
        message: &NotificationMessage,
    ) -> Result<(), AppError> {
        let recipient = match provider_kind {
            Provider::Slack => settings.slack_webhook_url.clone(),
            Provider::Email => settings.notification_email.clone(),
        };

        let mut log = NotificationLog::pending(
            intent.incident.client_id,
            Some(intent.incident.id),
            provider_kind,
            intent.kind,
            recipient.clone(),
        );
        store
            .insert_notification(log.clone())
            .await
            .map_err(|e| AppError::Transient(e.to_string()))?;

        let provider: Box<dyn NotificationProvider> = match provider_kind {
            Provider::Slack => Box::new(SlackProvider::new(
                settings.slack_webhook_url.clone(),
                settings.slack_channel_name.clone(),
                self.config.stub_slack,
            )),
            Provider::Email => {
                let smtp_config = self.config.smtp.as_ref().expect("checked by caller");
                Box::new(
                    SmtpProvider::new(smtp_config, recipient.clone())
                        .map_err(AppError::PermanentProvider)?,
                )
            }
        };

        let outcome = send_with_retry(provider.as_ref(), message, &self.config).await;
        match outcome {
            Ok(attempts) => {
                log.attempts = attempts;
                log.mark_success();
                store
                    .update_notification(&log)
                    .await
                    .map_err(|e| AppError::Transient(e.to_string()))?;
                store
                    .mark_incident_notified(intent.incident.id, Utc::now())
                    .await
                    .map_err(|e| AppError::Transient(e.to_string()))?;
                Ok(())
            }
            Err((attempts, err)) => {
                log.attempts = attempts;
                log.mark_failed(err.to_string());
                store
                    .update_notification(&log)
                    .await
                    .map_err(|e| AppError::Transient(e.to_string()))?;
                match err {
                    ProviderError::Permanent(e) => Err(AppError::PermanentProvider(e)),
                    ProviderError::Transient(e) => Err(AppError::Transient(e)),
                }
            }
        }
    }
}

/// Resolve the reminder cooldown: per-client override, else the process
/// default, else a hardcoded floor so a misconfigured process never spams.
fn reminder_cooldown_secs(settings: &ClientSettings, config: &Config) -> u64 {
    if settings.reminder_notification_seconds > 0 {
        return settings.reminder_notification_seconds;
    }
    config.default_alert_reminder.as_secs()
}

async fn last_contact(
    store: &dyn Store,
    subject: Subject,
) -> Result<Option<chrono::DateTime<Utc>>, crate::error::StoreError> {
    let open = store.last_successful_send(subject, NotificationKind::Open).await?;
    let reminder = store.last_successful_send(subject, NotificationKind::Reminder).await?;
    Ok(open.into_iter().chain(reminder).max())
}

/// Retry a provider send with jittered exponential backoff. Returns the
/// number of attempts made on success, or `(attempts, last_error)` once
/// attempts are exhausted or a permanent failure is hit.
async fn send_with_retry(
    provider: &dyn NotificationProvider,
    message: &NotificationMessage,
    config: &Config,
) -> Result<u32, (u32, ProviderError)> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match provider.send(message).await {
            Ok(()) => return Ok(attempt),
            Err(err @ ProviderError::Permanent(_)) => return Err((attempt, err)),
            Err(err @ ProviderError::Transient(_)) => {
                if attempt >= config.notify_max_attempts {
                    return Err((attempt, err));
                }
                let base_ms = (config.notify_backoff_base.as_millis() as u64)
                    .saturating_mul(1u64 << (attempt - 1))
                    .max(1);
                let low = ((base_ms as f64) * 0.8) as u64;
                let high = (((base_ms as f64) * 1.2) as u64).max(low + 1);
                let jittered = rand::thread_rng().gen_range(low..high);
                tokio::time::sleep(Duration::from_millis(jittered)).await;
            }
        }
    }
}

fn render(intent: &NotifyIntent) -> NotificationMessage {
    let subject_key = intent.incident.subject().canonical_key();
    let (subject, body) = match intent.kind {
        NotificationKind::Open => (
            format!("[{}] incident opened", intent.incident.severity),
            format!("{subject_key} is {} (opened {})", intent.incident.severity, intent.incident.opened_at),
        ),
        NotificationKind::Reminder => (
            format!("[{}] incident still open", intent.incident.severity),
            format!("{subject_key} has been open since {}", intent.incident.opened_at),
        ),
        NotificationKind::Resolve => (
            "incident resolved".to_string(),
            format!("{subject_key} recovered at {}", intent.incident.resolved_at.map(|t| t.to_string()).unwrap_or_default()),
        ),
    };
    NotificationMessage { subject, body }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use crate::types::{ClientId, HttpTargetId, Severity};

    fn settings_with_slack(client_id: ClientId) -> ClientSettings {
        ClientSettings {
            slack_webhook_url: "https://hooks.slack.test/x".into(),
            ..ClientSettings::defaults_for(client_id)
        }
    }

    #[tokio::test]
    async fn dispatch_skips_when_no_channel_configured() {
        let store = InMemoryStore::new();
        let config = Arc::new(Config::for_test());
        let notifier = Notifier::new(config);
        let subject = Subject::Http { client_id: ClientId::new(), http_target_id: HttpTargetId::new() };
        let incident = Incident::open(subject, Severity::Critical);
        assert!(notifier.dispatch(&store, NotifyIntent::open(incident)).await.is_ok());
    }

    #[tokio::test]
    async fn dispatch_sends_through_stubbed_slack() {
        let store = InMemoryStore::new();
        let client_id = ClientId::new();
        store.seed_settings(settings_with_slack(client_id));
        let config = Arc::new(Config::for_test());
        let notifier = Notifier::new(config);
        let subject = Subject::Http { client_id, http_target_id: HttpTargetId::new() };
        let incident = Incident::open(subject, Severity::Critical);
        notifier.dispatch(&store, NotifyIntent::open(incident)).await.unwrap();
    }

    #[tokio::test]
    async fn reminder_within_cooldown_is_silently_skipped() {
        let store = InMemoryStore::new();
        let client_id = ClientId::new();
        let mut settings = settings_with_slack(client_id);
        settings.reminder_notification_seconds = 3600;
        store.seed_settings(settings);
        let config = Arc::new(Config::for_test());
        let notifier = Notifier::new(config);
        let subject = Subject::Http { client_id, http_target_id: HttpTargetId::new() };
        let incident = Incident::open(subject, Severity::Critical);

        notifier.dispatch(&store, NotifyIntent::open(incident.clone())).await.unwrap();
        notifier.dispatch(&store, NotifyIntent::reminder(incident)).await.unwrap();
    }
}
