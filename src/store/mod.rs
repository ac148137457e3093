//! Persistence trait and its backends.
//!
//! Implementations must guarantee every uniqueness invariant is enforced by
//! the backend itself (unique constraints / partial indexes), not by a
//! check-then-insert race in the caller.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::types::{
    ApiKey, ClientId, ClientSettings, HttpTarget, Incident, Machine, MachineId,
    MetricDefinition, MetricDefinitionId, MetricInstance, MetricInstanceId, NotificationKind,
    NotificationLog, Sample, Severity, Subject, Threshold,
};

/// Outcome of attempting to open an incident for a subject.
#[derive(Debug, Clone)]
pub enum OpenOutcome {
    /// No OPEN incident existed for the subject; a new one was inserted.
    Opened(Incident),
    /// An OPEN incident already existed (conflict on the partial unique
    /// index); its `last_observed_at` was refreshed instead.
    AlreadyOpen(Incident),
}

/// Persistence trait covering every aggregate in the data model.
///
/// All methods are async to support a real database backend; the
/// in-memory implementation simply never awaits anything non-trivially.
#[async_trait]
pub trait Store: Send + Sync {
    // -- ApiKey / auth -----------------------------------------------
    /// Look up an api key by its bearer value.
    async fn find_api_key(&self, key: &str) -> Result<Option<ApiKey>, StoreError>;
    /// Record that a key was just used to authenticate a request.
    async fn touch_api_key(&self, id: crate::types::ApiKeyId, at: DateTime<Utc>) -> Result<(), StoreError>;

    // -- Machine -------------------------------------------------------
    /// Find a machine by its (client, fingerprint) natural key.
    async fn find_machine_by_fingerprint(
        &self,
        client_id: ClientId,
        fingerprint: &str,
    ) -> Result<Option<Machine>, StoreError>;
    /// Insert a brand new machine.
    async fn insert_machine(&self, machine: Machine) -> Result<(), StoreError>;
    /// Persist updated machine fields (hostname/os/last_seen).
    async fn update_machine(&self, machine: &Machine) -> Result<(), StoreError>;
    /// List machines whose `last_seen` is older than their client's
    /// `heartbeat_threshold_minutes`, falling back to `default_threshold_minutes`
    /// for clients with no settings row.
    async fn list_overdue_machines(
        &self,
        now: DateTime<Utc>,
        default_threshold_minutes: i64,
    ) -> Result<Vec<Machine>, StoreError>;

    // -- Ingest idempotency ---------------------------------------------
    /// Attempt to record an ingest id. Returns `true` if this is the first
    /// time it has been seen (new), `false` if it is a duplicate.
    async fn try_record_ingest_event(
        &self,
        client_id: ClientId,
        ingest_id: uuid::Uuid,
        machine_id: MachineId,
        sent_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    // -- Metric definitions / instances ----------------------------------
    /// Find a metric definition by its (client, name) natural key.
    async fn find_definition_by_name(
        &self,
        client_id: ClientId,
        name: &str,
    ) -> Result<Option<MetricDefinition>, StoreError>;
    /// Insert a new metric definition.
    async fn insert_definition(&self, definition: MetricDefinition) -> Result<(), StoreError>;
    /// Find a metric instance by its (machine, definition) natural key.
    async fn find_instance(
        &self,
        machine_id: MachineId,
        definition_id: MetricDefinitionId,
    ) -> Result<Option<MetricInstance>, StoreError>;
    /// Insert a newly-created metric instance.
    async fn insert_instance(&self, instance: MetricInstance) -> Result<(), StoreError>;
    /// Look up an instance by its own id, used by the evaluator.
    async fn get_instance(&self, id: MetricInstanceId) -> Result<Option<MetricInstance>, StoreError>;
    /// Persist updated instance fields (last_value, last_value_at, state).
    async fn update_instance(&self, instance: &MetricInstance) -> Result<(), StoreError>;
    /// Fetch the single threshold bound to an instance, if any.
    async fn find_threshold(
        &self,
        metric_instance_id: MetricInstanceId,
    ) -> Result<Option<Threshold>, StoreError>;
    /// Insert or replace the threshold bound to an instance.
    async fn upsert_threshold(&self, threshold: Threshold) -> Result<(), StoreError>;
    /// List every machine belonging to a client, for the operator surface.
    async fn list_machines(&self, client_id: ClientId) -> Result<Vec<Machine>, StoreError>;

    // -- Samples ---------------------------------------------------------
    /// Append a sample. Append-only; no uniqueness constraint.
    async fn insert_sample(&self, sample: Sample) -> Result<(), StoreError>;

    // -- HTTP targets ------------------------------------------------------
    /// Attempt to create a new http target; fails with `UniqueViolation` on
    /// an existing (client_id, url) row.
    async fn try_insert_http_target(&self, target: HttpTarget) -> Result<(), StoreError>;
    /// Find an http target by its (client, url) natural key (used to build
    /// the `existing_id` on a 409 conflict).
    async fn find_http_target_by_url(
        &self,
        client_id: ClientId,
        url: &str,
    ) -> Result<Option<HttpTarget>, StoreError>;
    /// List all active targets due for a check at `now`.
    async fn list_due_http_targets(&self, now: DateTime<Utc>) -> Result<Vec<HttpTarget>, StoreError>;
    /// List every http target belonging to a client, for the operator surface.
    async fn list_http_targets(&self, client_id: ClientId) -> Result<Vec<HttpTarget>, StoreError>;
    /// Delete a target the operator no longer wants probed.
    async fn delete_http_target(&self, client_id: ClientId, id: crate::types::HttpTargetId) -> Result<(), StoreError>;
    /// Persist the result of a probe (last_check_at/last_status/last_latency_ms).
    async fn update_http_target_check(&self, target: &HttpTarget) -> Result<(), StoreError>;

    // -- Incidents ---------------------------------------------------------
    /// Attempt to open an incident for a subject, honoring the
    /// single-OPEN-per-subject partial unique index as the conflict oracle.
    async fn try_open_incident(
        &self,
        subject: Subject,
        severity: Severity,
    ) -> Result<OpenOutcome, StoreError>;
    /// Resolve any OPEN incident for a subject. Returns `None` if there was
    /// no open incident (a no-op per the idempotence law).
    async fn resolve_incident(&self, subject: Subject) -> Result<Option<Incident>, StoreError>;
    /// Find the currently OPEN incident for a subject, if any.
    async fn find_open_incident(&self, subject: Subject) -> Result<Option<Incident>, StoreError>;
    /// Fetch a single incident by id, regardless of status or tenant. The
    /// caller is responsible for any tenant check.
    async fn get_incident(&self, incident_id: crate::types::IncidentId) -> Result<Option<Incident>, StoreError>;
    /// List incidents for a client, most recently opened first.
    async fn list_incidents(
        &self,
        client_id: ClientId,
        open_only: bool,
    ) -> Result<Vec<Incident>, StoreError>;
    /// Record that a notification was sent for an incident.
    async fn mark_incident_notified(
        &self,
        incident_id: crate::types::IncidentId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    // -- Notifications -------------------------------------------------------
    /// Insert a notification log row (status=pending, per the send protocol).
    async fn insert_notification(&self, log: NotificationLog) -> Result<(), StoreError>;
    /// Persist an updated notification log row (success/failed transition).
    async fn update_notification(&self, log: &NotificationLog) -> Result<(), StoreError>;
    /// The most recent successful send time for a subject/kind pair, used
    /// to compute cooldown.
    async fn last_successful_send(
        &self,
        subject: Subject,
        kind: NotificationKind,
    ) -> Result<Option<DateTime<Utc>>, StoreError>;
    /// List notification attempts logged against an incident, newest first.
    async fn list_notifications_for_incident(
        &self,
        incident_id: crate::types::IncidentId,
    ) -> Result<Vec<NotificationLog>, StoreError>;

    // -- Settings ---------------------------------------------------------
    /// Fetch a client's settings, or defaults if none have been saved.
    async fn get_settings(&self, client_id: ClientId) -> Result<ClientSettings, StoreError>;
    /// Insert or replace a client's settings.
    async fn put_settings(&self, settings: ClientSettings) -> Result<(), StoreError>;

    // -- Health -------------------------------------------------------------
    /// Whether the backend is currently reachable. The in-memory store is
    /// always healthy; the Postgres store pings the pool.
    async fn is_healthy(&self) -> bool {
        true
    }
}

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
