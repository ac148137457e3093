//! In-memory store for tests: same trait, same invariants, no database.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::StoreError;
use crate::types::{
    ApiKey, ApiKeyId, ClientId, ClientSettings, HttpTarget, HttpTargetId, Incident, IncidentId,
    IncidentStatus, Machine, MachineId, MetricDefinition, MetricDefinitionId, MetricInstance,
    MetricInstanceId, NotificationId, NotificationKind, NotificationLog, Sample, Severity,
    Subject, Threshold,
};

use super::{OpenOutcome, Store};

#[derive(Default)]
struct Inner {
    api_keys_by_value: HashMap<String, ApiKeyId>,
    api_keys: HashMap<ApiKeyId, ApiKey>,
    machines: HashMap<MachineId, Machine>,
    machine_by_fingerprint: HashMap<(ClientId, String), MachineId>,
    ingest_events: HashSet<(ClientId, Uuid)>,
    definitions: HashMap<MetricDefinitionId, MetricDefinition>,
    definition_by_name: HashMap<(ClientId, String), MetricDefinitionId>,
    instances: HashMap<MetricInstanceId, MetricInstance>,
    instance_by_natural_key: HashMap<(MachineId, MetricDefinitionId), MetricInstanceId>,
    thresholds: HashMap<MetricInstanceId, Threshold>,
    samples: Vec<Sample>,
    http_targets: HashMap<HttpTargetId, HttpTarget>,
    http_target_by_url: HashMap<(ClientId, String), HttpTargetId>,
    incidents: HashMap<IncidentId, Incident>,
    open_incident_by_subject: HashMap<String, IncidentId>,
    notifications: HashMap<NotificationId, NotificationLog>,
    settings: HashMap<ClientId, ClientSettings>,
}

/// In-memory implementation of [`Store`], used by unit and integration tests.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    /// Construct an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Test helper: register an api key directly.
    pub fn seed_api_key(&self, key: ApiKey) {
        let mut inner = self.inner.lock();
        inner.api_keys_by_value.insert(key.key.clone(), key.id);
        inner.api_keys.insert(key.id, key);
    }

    /// Test helper: register a threshold directly.
    pub fn seed_threshold(&self, threshold: Threshold) {
        self.inner.lock().thresholds.insert(threshold.metric_instance_id, threshold);
    }

    /// Test helper: register client settings directly.
    pub fn seed_settings(&self, settings: ClientSettings) {
        self.inner.lock().settings.insert(settings.client_id, settings);
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn find_api_key(&self, key: &str) -> Result<Option<ApiKey>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .api_keys_by_value
            .get(key)
            .and_then(|id| inner.api_keys.get(id))
            .cloned())
    }

    async fn touch_api_key(&self, id: ApiKeyId, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if let Some(key) = inner.api_keys.get_mut(&id) {
            key.last_used_at = Some(at);
        }
        Ok(())
    }

    async fn find_machine_by_fingerprint(
        &self,
        client_id: ClientId,
        fingerprint: &str,
    ) -> Result<Option<Machine>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .machine_by_fingerprint
            .get(&(client_id, fingerprint.to_string()))
            .and_then(|id| inner.machines.get(id))
            .cloned())
    }

    async fn insert_machine(&self, machine: Machine) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner
            .machine_by_fingerprint
            .insert((machine.client_id, machine.fingerprint.clone()), machine.id);
        inner.machines.insert(machine.id, machine);
        Ok(())
    }

    async fn update_machine(&self, machine: &Machine) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.machines.insert(machine.id, machine.clone());
        Ok(())
    }

    async fn list_overdue_machines(
        &self,
        now: DateTime<Utc>,
        default_threshold_minutes: i64,
    ) -> Result<Vec<Machine>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .machines
            .values()
            .filter(|m| {
                if !m.is_active {
                    return false;
                }
                let threshold = inner
                    .settings
                    .get(&m.client_id)
                    .map(|s| s.heartbeat_threshold_minutes)
                    .unwrap_or(default_threshold_minutes);
                m.is_overdue(now, threshold)
            })
            .cloned()
            .collect())
    }

    async fn try_record_ingest_event(
        &self,
        client_id: ClientId,
        ingest_id: Uuid,
        _machine_id: MachineId,
        _sent_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        Ok(inner.ingest_events.insert((client_id, ingest_id)))
    }

    async fn find_definition_by_name(
        &self,
        client_id: ClientId,
        name: &str,
    ) -> Result<Option<MetricDefinition>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .definition_by_name
            .get(&(client_id, name.to_string()))
            .and_then(|id| inner.definitions.get(id))
            .cloned())
    }

    async fn insert_definition(&self, definition: MetricDefinition) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner
            .definition_by_name
            .insert((definition.client_id, definition.name.clone()), definition.id);
        inner.definitions.insert(definition.id, definition);
        Ok(())
    }

    async fn find_instance(
        &self,
        machine_id: MachineId,
        definition_id: MetricDefinitionId,
    ) -> Result<Option<MetricInstance>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .instance_by_natural_key
            .get(&(machine_id, definition_id))
            .and_then(|id| inner.instances.get(id))
            .cloned())
    }

    async fn insert_instance(&self, instance: MetricInstance) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner
            .instance_by_natural_key
            .insert((instance.machine_id, instance.definition_id), instance.id);
        inner.instances.insert(instance.id, instance);
        Ok(())
    }

    async fn get_instance(&self, id: MetricInstanceId) -> Result<Option<MetricInstance>, StoreError> {
        Ok(self.inner.lock().instances.get(&id).cloned())
    }

    async fn update_instance(&self, instance: &MetricInstance) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.instances.insert(instance.id, instance.clone());
        Ok(())
    }

    async fn find_threshold(
        &self,
        metric_instance_id: MetricInstanceId,
    ) -> Result<Option<Threshold>, StoreError> {
        Ok(self.inner.lock().thresholds.get(&metric_instance_id).cloned())
    }

    async fn upsert_threshold(&self, threshold: Threshold) -> Result<(), StoreError> {
        self.inner.lock().thresholds.insert(threshold.metric_instance_id, threshold);
        Ok(())
    }

    async fn list_machines(&self, client_id: ClientId) -> Result<Vec<Machine>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner.machines.values().filter(|m| m.client_id == client_id).cloned().collect())
    }

    async fn insert_sample(&self, sample: Sample) -> Result<(), StoreError> {
        self.inner.lock().samples.push(sample);
        Ok(())
    }

    async fn try_insert_http_target(&self, target: HttpTarget) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let key = (target.client_id, target.url.clone());
        if let Some(existing) = inner.http_target_by_url.get(&key) {
            return Err(StoreError::UniqueViolation(existing.to_string()));
        }
        inner.http_target_by_url.insert(key, target.id);
        inner.http_targets.insert(target.id, target);
        Ok(())
    }

    async fn find_http_target_by_url(
        &self,
        client_id: ClientId,
        url: &str,
    ) -> Result<Option<HttpTarget>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .http_target_by_url
            .get(&(client_id, url.to_string()))
            .and_then(|id| inner.http_targets.get(id))
            .cloned())
    }

    async fn list_due_http_targets(&self, now: DateTime<Utc>) -> Result<Vec<HttpTarget>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .http_targets
            .values()
            .filter(|t| t.is_due(now))
            .cloned()
            .collect())
    }

    async fn update_http_target_check(&self, target: &HttpTarget) -> Result<(), StoreError> {
        self.inner.lock().http_targets.insert(target.id, target.clone());
        Ok(())
    }

    async fn list_http_targets(&self, client_id: ClientId) -> Result<Vec<HttpTarget>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner.http_targets.values().filter(|t| t.client_id == client_id).cloned().collect())
    }

    async fn delete_http_target(&self, client_id: ClientId, id: HttpTargetId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if let Some(target) = inner.http_targets.get(&id) {
            if target.client_id != client_id {
                return Err(StoreError::NotFound(id.to_string()));
            }
            let url = target.url.clone();
            inner.http_target_by_url.remove(&(client_id, url));
        }
        inner.http_targets.remove(&id);
        Ok(())
    }

    async fn try_open_incident(
        &self,
        subject: Subject,
        severity: Severity,
    ) -> Result<OpenOutcome, StoreError> {
        let mut inner = self.inner.lock();
        let key = subject.canonical_key();
        if let Some(existing_id) = inner.open_incident_by_subject.get(&key).copied() {
            let incident = inner
                .incidents
                .get_mut(&existing_id)
                .expect("open index points at a live incident");
            incident.touch_observed();
            return Ok(OpenOutcome::AlreadyOpen(incident.clone()));
        }
        let incident = Incident::open(subject, severity);
        inner.open_incident_by_subject.insert(key, incident.id);
        inner.incidents.insert(incident.id, incident.clone());
        Ok(OpenOutcome::Opened(incident))
    }

    async fn resolve_incident(&self, subject: Subject) -> Result<Option<Incident>, StoreError> {
        let mut inner = self.inner.lock();
        let key = subject.canonical_key();
        let Some(id) = inner.open_incident_by_subject.remove(&key) else {
            return Ok(None);
        };
        let incident = inner.incidents.get_mut(&id).expect("removed key must be live");
        incident.resolve();
        Ok(Some(incident.clone()))
    }

    async fn find_open_incident(&self, subject: Subject) -> Result<Option<Incident>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .open_incident_by_subject
            .get(&subject.canonical_key())
            .and_then(|id| inner.incidents.get(id))
            .cloned())
    }

    async fn list_incidents(&self, client_id: ClientId, open_only: bool) -> Result<Vec<Incident>, StoreError> {
        let inner = self.inner.lock();
        let mut incidents: Vec<Incident> = inner
            .incidents
            .values()
            .filter(|i| i.client_id == client_id && (!open_only || i.status == IncidentStatus::Open))
            .cloned()
            .collect();
        incidents.sort_by(|a, b| b.opened_at.cmp(&a.opened_at));
        Ok(incidents)
    }

    async fn get_incident(&self, incident_id: IncidentId) -> Result<Option<Incident>, StoreError> {
        Ok(self.inner.lock().incidents.get(&incident_id).cloned())
    }

    async fn mark_incident_notified(&self, incident_id: IncidentId, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if let Some(incident) = inner.incidents.get_mut(&incident_id) {
            incident.last_notified_at = Some(at);
        }
        Ok(())
    }

    async fn insert_notification(&self, log: NotificationLog) -> Result<(), StoreError> {
        self.inner.lock().notifications.insert(log.id, log);
        Ok(())
    }

    async fn update_notification(&self, log: &NotificationLog) -> Result<(), StoreError> {
        self.inner.lock().notifications.insert(log.id, log.clone());
        Ok(())
    }

    async fn last_successful_send(
        &self,
        subject: Subject,
        kind: NotificationKind,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let inner = self.inner.lock();
        // A subject's history spans every incident ever opened for it.
        let incident_ids: HashSet<IncidentId> = inner
            .incidents
            .values()
            .filter(|i| i.subject() == subject)
            .map(|i| i.id)
            .collect();

        Ok(inner
            .notifications
            .values()
            .filter(|n| {
                n.kind == kind
                    && n.status == crate::types::NotificationStatus::Success
                    && n.incident_id.is_some_and(|id| incident_ids.contains(&id))
            })
            .filter_map(|n| n.sent_at)
            .max())
    }

    async fn list_notifications_for_incident(
        &self,
        incident_id: IncidentId,
    ) -> Result<Vec<NotificationLog>, StoreError> {
        let inner = self.inner.lock();
        let mut logs: Vec<NotificationLog> = inner
            .notifications
            .values()
            .filter(|n| n.incident_id == Some(incident_id))
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(logs)
    }

    async fn get_settings(&self, client_id: ClientId) -> Result<ClientSettings, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .settings
            .get(&client_id)
            .cloned()
            .unwrap_or_else(|| ClientSettings::defaults_for(client_id)))
    }

    async fn put_settings(&self, settings: ClientSettings) -> Result<(), StoreError> {
        self.inner.lock().settings.insert(settings.client_id, settings);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HttpMethod, HttpTargetId};

    fn make_target(client_id: ClientId, url: &str) -> HttpTarget {
        HttpTarget {
            id: HttpTargetId::new(),
            client_id,
            name: "T".into(),
            url: url.into(),
            method: HttpMethod::Get,
            accepted_status_codes: vec![],
            timeout_ms: 1000,
            check_interval_s: 60,
            is_active: true,
            last_check_at: None,
            last_status: None,
            last_latency_ms: None,
        }
    }

    #[tokio::test]
    async fn duplicate_http_target_url_conflicts() {
        let store = InMemoryStore::new();
        let client_id = ClientId::new();
        let target = make_target(client_id, "https://example.com");
        store.try_insert_http_target(target.clone()).await.unwrap();

        let duplicate = make_target(client_id, "https://example.com");
        let err = store.try_insert_http_target(duplicate).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn ingest_event_is_recorded_once() {
        let store = InMemoryStore::new();
        let client_id = ClientId::new();
        let ingest_id = Uuid::new_v4();
        let machine_id = MachineId::new();

        let first = store
            .try_record_ingest_event(client_id, ingest_id, machine_id, Utc::now())
            .await
            .unwrap();
        let second = store
            .try_record_ingest_event(client_id, ingest_id, machine_id, Utc::now())
            .await
            .unwrap();

        assert!(first);
        assert!(!second);
    }

    #[tokio::test]
    async fn open_incident_is_idempotent() {
        let store = InMemoryStore::new();
        let subject = Subject::Metric {
            client_id: ClientId::new(),
            metric_instance_id: MetricInstanceId::new(),
        };

        let first = store.try_open_incident(subject, Severity::Critical).await.unwrap();
        let second = store.try_open_incident(subject, Severity::Critical).await.unwrap();

        assert!(matches!(first, OpenOutcome::Opened(_)));
        assert!(matches!(second, OpenOutcome::AlreadyOpen(_)));

        let open = store.find_open_incident(subject).await.unwrap();
        assert!(open.is_some());
    }

    #[tokio::test]
    async fn resolve_without_open_is_a_no_op() {
        let store = InMemoryStore::new();
        let subject = Subject::Metric {
            client_id: ClientId::new(),
            metric_instance_id: MetricInstanceId::new(),
        };
        let resolved = store.resolve_incident(subject).await.unwrap();
        assert!(resolved.is_none());
    }
}
