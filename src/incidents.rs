//! Incident manager: turns evaluator intents into durable incident rows
//! and notify intents, relying on the store's unique partial index as the
//! conflict oracle rather than a check-then-insert race.

use crate::error::AppError;
use crate::evaluator::IncidentIntent;
use crate::notifier::NotifyIntent;
use crate::store::{OpenOutcome, Store};
use crate::types::{Severity, Subject};

/// Apply one evaluator intent, returning the notify intent it produces, if any.
pub async fn apply(store: &dyn Store, intent: IncidentIntent) -> Result<Option<NotifyIntent>, AppError> {
    match intent {
        IncidentIntent::Open { subject, severity } => open(store, subject, severity).await,
        IncidentIntent::Resolve { subject } => resolve(store, subject).await,
    }
}

async fn open(store: &dyn Store, subject: Subject, severity: Severity) -> Result<Option<NotifyIntent>, AppError> {
    let outcome = store
        .try_open_incident(subject, severity)
        .await
        .map_err(|e| AppError::Transient(e.to_string()))?;

    match outcome {
        OpenOutcome::Opened(incident) => {
            incident.log_transition("opened");
            Ok(Some(NotifyIntent::open(incident)))
        }
        OpenOutcome::AlreadyOpen(incident) => {
            incident.log_transition("re-observed");
            Ok(Some(NotifyIntent::reminder(incident)))
        }
    }
}

async fn resolve(store: &dyn Store, subject: Subject) -> Result<Option<NotifyIntent>, AppError> {
    let resolved = store
        .resolve_incident(subject)
        .await
        .map_err(|e| AppError::Transient(e.to_string()))?;

    let Some(incident) = resolved else {
        return Ok(None);
    };
    incident.log_transition("resolved");

    let settings = store
        .get_settings(subject.client_id())
        .await
        .map_err(|e| AppError::Transient(e.to_string()))?;

    if !settings.notify_on_resolve {
        return Ok(None);
    }
    Ok(Some(NotifyIntent::resolve(incident)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use crate::types::{ClientId, MetricInstanceId};

    fn subject() -> Subject {
        Subject::Metric {
            client_id: ClientId::new(),
            metric_instance_id: MetricInstanceId::new(),
        }
    }

    #[tokio::test]
    async fn first_open_emits_open_notify_intent() {
        let store = InMemoryStore::new();
        let subject = subject();
        let notify = apply(&store, IncidentIntent::Open { subject, severity: Severity::Critical })
            .await
            .unwrap();
        assert!(matches!(notify, Some(NotifyIntent { kind: crate::types::NotificationKind::Open, .. })));
    }

    #[tokio::test]
    async fn re_open_emits_reminder_not_open() {
        let store = InMemoryStore::new();
        let subject = subject();
        apply(&store, IncidentIntent::Open { subject, severity: Severity::Critical }).await.unwrap();
        let notify = apply(&store, IncidentIntent::Open { subject, severity: Severity::Critical })
            .await
            .unwrap();
        assert!(matches!(notify, Some(NotifyIntent { kind: crate::types::NotificationKind::Reminder, .. })));
    }

    #[tokio::test]
    async fn resolve_without_open_is_silent() {
        let store = InMemoryStore::new();
        let notify = apply(&store, IncidentIntent::Resolve { subject: subject() }).await.unwrap();
        assert!(notify.is_none());
    }

    #[tokio::test]
    async fn resolve_respects_notify_on_resolve_false() {
        let store = InMemoryStore::new();
        let subject = subject();
        store.seed_settings(crate::types::ClientSettings {
            notify_on_resolve: false,
            ..crate::types::ClientSettings::defaults_for(subject.client_id())
        });
        apply(&store, IncidentIntent::Open { subject, severity: Severity::Critical }).await.unwrap();
        let notify = apply(&store, IncidentIntent::Resolve { subject }).await.unwrap();
        assert!(notify.is_none());
    }
}
