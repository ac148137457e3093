//! PostgreSQL store for production use.
//!
//! ## Configuration
//!
//! All settings can be configured via environment variables:
//! - `DATABASE_URL`: PostgreSQL connection string (required)
//! - `DB_MAX_CONNECTIONS`: Maximum pool size (default: 10)
//! - `DB_MIN_CONNECTIONS`: Minimum idle connections (default: 2)
//! - `DB_CONNECT_TIMEOUT_SECS`: Connection timeout (default: 10)
//! - `DB_IDLE_TIMEOUT_SECS`: Idle connection timeout (default: 300)
//! - `DB_MAX_LIFETIME_SECS`: Max connection lifetime (default: 1800)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use uuid::Uuid;

use crate::canonical::subject_lock_key;
use crate::config::DatabaseConfig;
use crate::error::StoreError;
use crate::types::{
    ApiKey, ApiKeyId, ClientId, ClientSettings, Comparison, HttpTarget, HttpTargetId, Incident,
    IncidentId, IncidentStatus, Machine, MachineId, MetricDefinition, MetricDefinitionId,
    MetricInstance, MetricInstanceId, NotificationKind, NotificationLog, NotificationStatus,
    Provider, Sample, Severity, Subject, Threshold, ValueKind,
};

use super::{OpenOutcome, Store};

/// PostgreSQL-backed [`Store`].
///
/// Queries are raw `sqlx::query` binds rather than the `query!` macro: there
/// is no live database available at build time to check them against.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Build a pool from an already-resolved [`DatabaseConfig`] and run
    /// pending migrations.
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "initializing PostgreSQL connection pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .test_before_acquire(true)
            .connect(&config.url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Build directly from `DATABASE_URL` and friends, bypassing [`crate::config::Config`].
    pub async fn from_env() -> Result<Self, sqlx::Error> {
        let url = std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgresql://localhost/sentinel".into());
        let config = DatabaseConfig {
            url,
            max_connections: 10,
            min_connections: 2,
            connect_timeout: std::time::Duration::from_secs(10),
            idle_timeout: std::time::Duration::from_secs(300),
            max_lifetime: std::time::Duration::from_secs(1800),
        };
        Self::new(&config).await
    }

    /// Expose the pool for health checks.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Whether the database is currently reachable.
    pub async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }

    fn parse_api_key(row: &PgRow) -> Result<ApiKey, StoreError> {
        Ok(ApiKey {
            id: ApiKeyId::from_uuid(row.try_get("id")?),
            client_id: ClientId::from_uuid(row.try_get("client_id")?),
            key: row.try_get("key")?,
            name: row.try_get("name")?,
            is_active: row.try_get("is_active")?,
            machine_id: row.try_get::<Option<Uuid>, _>("machine_id")?.map(MachineId::from_uuid),
            last_used_at: row.try_get("last_used_at")?,
        })
    }

    fn parse_machine(row: &PgRow) -> Result<Machine, StoreError> {
        Ok(Machine {
            id: MachineId::from_uuid(row.try_get("id")?),
            client_id: ClientId::from_uuid(row.try_get("client_id")?),
            hostname: row.try_get("hostname")?,
            os: row.try_get("os")?,
            fingerprint: row.try_get("fingerprint")?,
            is_active: row.try_get("is_active")?,
            registered_at: row.try_get("registered_at")?,
            last_seen: row.try_get("last_seen")?,
        })
    }

    fn parse_definition(row: &PgRow) -> Result<MetricDefinition, StoreError> {
        let value_type: String = row.try_get("value_type")?;
        Ok(MetricDefinition {
            id: MetricDefinitionId::from_uuid(row.try_get("id")?),
            client_id: ClientId::from_uuid(row.try_get("client_id")?),
            name: row.try_get("name")?,
            value_type: parse_value_kind(&value_type)?,
            unit: row.try_get("unit")?,
            suggested: row.try_get("suggested")?,
        })
    }

    fn parse_instance(row: &PgRow) -> Result<MetricInstance, StoreError> {
        let state: String = row.try_get("state")?;
        let last_value: Option<serde_json::Value> = row.try_get("last_value")?;
        Ok(MetricInstance {
            id: MetricInstanceId::from_uuid(row.try_get("id")?),
            machine_id: MachineId::from_uuid(row.try_get("machine_id")?),
            definition_id: MetricDefinitionId::from_uuid(row.try_get("definition_id")?),
            alert_enabled: row.try_get("alert_enabled")?,
            paused: row.try_get("paused")?,
            last_value: last_value.map(|v| serde_json::from_value(v)).transpose()
                .map_err(|e| StoreError::Backend(e.to_string()))?,
            last_value_at: row.try_get("last_value_at")?,
            state: parse_instance_state(&state)?,
        })
    }

    fn parse_threshold(row: &PgRow) -> Result<Threshold, StoreError> {
        let comparison: String = row.try_get("comparison")?;
        let severity: String = row.try_get("severity")?;
        let value: serde_json::Value = row.try_get("value")?;
        Ok(Threshold {
            id: crate::types::ThresholdId::from_uuid(row.try_get("id")?),
            metric_instance_id: MetricInstanceId::from_uuid(row.try_get("metric_instance_id")?),
            comparison: parse_comparison(&comparison)?,
            value: serde_json::from_value(value).map_err(|e| StoreError::Backend(e.to_string()))?,
            severity: parse_severity(&severity)?,
        })
    }

    fn parse_http_target(row: &PgRow) -> Result<HttpTarget, StoreError> {
        let method: String = row.try_get("method")?;
        let codes: Vec<i16> = row.try_get("accepted_status_codes")?;
        Ok(HttpTarget {
            id: HttpTargetId::from_uuid(row.try_get("id")?),
            client_id: ClientId::from_uuid(row.try_get("client_id")?),
            name: row.try_get("name")?,
            url: row.try_get("url")?,
            method: method.parse().map_err(|_| StoreError::Backend(format!("unknown http method {method}")))?,
            accepted_status_codes: codes.into_iter().map(|c| c as u16).collect(),
            timeout_ms: row.try_get::<i64, _>("timeout_ms")? as u64,
            check_interval_s: row.try_get::<i64, _>("check_interval_s")? as u64,
            is_active: row.try_get("is_active")?,
            last_check_at: row.try_get("last_check_at")?,
            last_status: row.try_get::<Option<i16>, _>("last_status")?.map(|s| s as u16),
            last_latency_ms: row.try_get::<Option<i64>, _>("last_latency_ms")?.map(|v| v as u64),
        })
    }

    fn parse_incident(row: &PgRow) -> Result<Incident, StoreError> {
        let status: String = row.try_get("status")?;
        let severity: String = row.try_get("severity")?;
        Ok(Incident {
            id: IncidentId::from_uuid(row.try_get("id")?),
            client_id: ClientId::from_uuid(row.try_get("client_id")?),
            http_target_id: row.try_get::<Option<Uuid>, _>("http_target_id")?.map(HttpTargetId::from_uuid),
            metric_instance_id: row
                .try_get::<Option<Uuid>, _>("metric_instance_id")?
                .map(MetricInstanceId::from_uuid),
            machine_id: row.try_get::<Option<Uuid>, _>("machine_id")?.map(MachineId::from_uuid),
            status: if status == "OPEN" { IncidentStatus::Open } else { IncidentStatus::Resolved },
            severity: parse_severity(&severity)?,
            opened_at: row.try_get("opened_at")?,
            resolved_at: row.try_get("resolved_at")?,
            last_notified_at: row.try_get("last_notified_at")?,
            last_observed_at: row.try_get("last_observed_at")?,
        })
    }

    async fn fetch_open_incident(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        subject: Subject,
    ) -> Result<Option<Incident>, StoreError> {
        let (http_target_id, metric_instance_id, machine_id) = subject_columns(subject);
        let row = sqlx::query(
            "SELECT * FROM incidents
             WHERE status = 'OPEN'
               AND http_target_id IS NOT DISTINCT FROM $1
               AND metric_instance_id IS NOT DISTINCT FROM $2
               AND machine_id IS NOT DISTINCT FROM $3",
        )
        .bind(http_target_id)
        .bind(metric_instance_id)
        .bind(machine_id)
        .fetch_optional(&mut **tx)
        .await?;
        row.as_ref().map(Self::parse_incident).transpose()
    }

    fn parse_notification(row: &PgRow) -> Result<NotificationLog, StoreError> {
        let provider: String = row.try_get("provider")?;
        let kind: String = row.try_get("kind")?;
        let status: String = row.try_get("status")?;
        Ok(NotificationLog {
            id: crate::types::NotificationId::from_uuid(row.try_get("id")?),
            client_id: ClientId::from_uuid(row.try_get("client_id")?),
            incident_id: row.try_get::<Option<Uuid>, _>("incident_id")?.map(IncidentId::from_uuid),
            provider: parse_provider(&provider)?,
            kind: parse_notification_kind(&kind)?,
            recipient: row.try_get("recipient")?,
            status: parse_notification_status(&status)?,
            sent_at: row.try_get("sent_at")?,
            created_at: row.try_get("created_at")?,
            error: row.try_get("error")?,
            attempts: row.try_get::<i32, _>("attempts")? as u32,
        })
    }
}

/// Splits a [`Subject`] into the three nullable incident columns that
/// together identify it, exactly one of which is set.
fn subject_columns(subject: Subject) -> (Option<Uuid>, Option<Uuid>, Option<Uuid>) {
    match subject {
        Subject::Http { http_target_id, .. } => (Some(*http_target_id.as_uuid()), None, None),
        Subject::Metric { metric_instance_id, .. } => (None, Some(*metric_instance_id.as_uuid()), None),
        Subject::Heartbeat { machine_id, .. } => (None, None, Some(*machine_id.as_uuid())),
    }
}

fn parse_value_kind(s: &str) -> Result<ValueKind, StoreError> {
    match s {
        "number" => Ok(ValueKind::Number),
        "bool" => Ok(ValueKind::Bool),
        "string" => Ok(ValueKind::String),
        other => Err(StoreError::Backend(format!("unknown value kind {other}"))),
    }
}

fn parse_instance_state(s: &str) -> Result<crate::types::InstanceState, StoreError> {
    use crate::types::InstanceState;
    match s {
        "UNKNOWN" => Ok(InstanceState::Unknown),
        "NORMAL" => Ok(InstanceState::Normal),
        "CRITICAL" => Ok(InstanceState::Critical),
        other => Err(StoreError::Backend(format!("unknown instance state {other}"))),
    }
}

fn parse_comparison(s: &str) -> Result<Comparison, StoreError> {
    match s {
        "gt" => Ok(Comparison::Gt),
        "lt" => Ok(Comparison::Lt),
        "eq" => Ok(Comparison::Eq),
        "ge" => Ok(Comparison::Ge),
        "le" => Ok(Comparison::Le),
        "ne" => Ok(Comparison::Ne),
        "contains" => Ok(Comparison::Contains),
        other => Err(StoreError::Backend(format!("unknown comparison {other}"))),
    }
}

fn parse_severity(s: &str) -> Result<Severity, StoreError> {
    match s {
        "info" => Ok(Severity::Info),
        "warning" => Ok(Severity::Warning),
        "error" => Ok(Severity::Error),
        "critical" => Ok(Severity::Critical),
        other => Err(StoreError::Backend(format!("unknown severity {other}"))),
    }
}

fn parse_provider(s: &str) -> Result<Provider, StoreError> {
    match s {
        "slack" => Ok(Provider::Slack),
        "email" => Ok(Provider::Email),
        other => Err(StoreError::Backend(format!("unknown notification provider {other}"))),
    }
}

fn parse_notification_kind(s: &str) -> Result<NotificationKind, StoreError> {
    match s {
        "open" => Ok(NotificationKind::Open),
        "reminder" => Ok(NotificationKind::Reminder),
        "resolve" => Ok(NotificationKind::Resolve),
        other => Err(StoreError::Backend(format!("unknown notification kind {other}"))),
    }
}

fn parse_notification_status(s: &str) -> Result<NotificationStatus, StoreError> {
    match s {
        "pending" => Ok(NotificationStatus::Pending),
        "success" => Ok(NotificationStatus::Success),
        "failed" => Ok(NotificationStatus::Failed),
        other => Err(StoreError::Backend(format!("unknown notification status {other}"))),
    }
}

fn instance_state_str(state: crate::types::InstanceState) -> &'static str {
    use crate::types::InstanceState;
    match state {
        InstanceState::Unknown => "UNKNOWN",
        InstanceState::Normal => "NORMAL",
        InstanceState::Critical => "CRITICAL",
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn find_api_key(&self, key: &str) -> Result<Option<ApiKey>, StoreError> {
        let row = sqlx::query("SELECT * FROM api_keys WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::parse_api_key).transpose()
    }

    async fn touch_api_key(&self, id: ApiKeyId, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query("UPDATE api_keys SET last_used_at = $2 WHERE id = $1")
            .bind(*id.as_uuid())
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_machine_by_fingerprint(
        &self,
        client_id: ClientId,
        fingerprint: &str,
    ) -> Result<Option<Machine>, StoreError> {
        let row = sqlx::query("SELECT * FROM machines WHERE client_id = $1 AND fingerprint = $2")
            .bind(*client_id.as_uuid())
            .bind(fingerprint)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::parse_machine).transpose()
    }

    async fn insert_machine(&self, machine: Machine) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO machines (id, client_id, hostname, os, fingerprint, is_active, registered_at, last_seen)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(*machine.id.as_uuid())
        .bind(*machine.client_id.as_uuid())
        .bind(&machine.hostname)
        .bind(&machine.os)
        .bind(&machine.fingerprint)
        .bind(machine.is_active)
        .bind(machine.registered_at)
        .bind(machine.last_seen)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_machine(&self, machine: &Machine) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE machines SET hostname = $2, os = $3, last_seen = $4, is_active = $5 WHERE id = $1",
        )
        .bind(*machine.id.as_uuid())
        .bind(&machine.hostname)
        .bind(&machine.os)
        .bind(machine.last_seen)
        .bind(machine.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_overdue_machines(
        &self,
        now: DateTime<Utc>,
        default_threshold_minutes: i64,
    ) -> Result<Vec<Machine>, StoreError> {
        let rows = sqlx::query(
            "SELECT m.* FROM machines m
             LEFT JOIN client_settings cs ON cs.client_id = m.client_id
             WHERE m.is_active
               AND m.last_seen < $1 - (COALESCE(cs.heartbeat_threshold_minutes, $2) * INTERVAL '1 minute')",
        )
        .bind(now)
        .bind(default_threshold_minutes)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::parse_machine).collect()
    }

    async fn try_record_ingest_event(
        &self,
        client_id: ClientId,
        ingest_id: Uuid,
        machine_id: MachineId,
        sent_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO ingest_events (id, client_id, ingest_id, machine_id, received_at, sent_at)
             VALUES ($1, $2, $3, $4, now(), $5)",
        )
        .bind(Uuid::new_v4())
        .bind(*client_id.as_uuid())
        .bind(ingest_id)
        .bind(*machine_id.as_uuid())
        .bind(sent_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) => match StoreError::from(err) {
                StoreError::UniqueViolation(_) => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn find_definition_by_name(
        &self,
        client_id: ClientId,
        name: &str,
    ) -> Result<Option<MetricDefinition>, StoreError> {
        let row = sqlx::query("SELECT * FROM metric_definitions WHERE client_id = $1 AND name = $2")
            .bind(*client_id.as_uuid())
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::parse_definition).transpose()
    }

    async fn insert_definition(&self, definition: MetricDefinition) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO metric_definitions (id, client_id, name, value_type, unit, suggested)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(*definition.id.as_uuid())
        .bind(*definition.client_id.as_uuid())
        .bind(&definition.name)
        .bind(value_kind_str(definition.value_type))
        .bind(&definition.unit)
        .bind(definition.suggested)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_instance(
        &self,
        machine_id: MachineId,
        definition_id: MetricDefinitionId,
    ) -> Result<Option<MetricInstance>, StoreError> {
        let row = sqlx::query("SELECT * FROM metric_instances WHERE machine_id = $1 AND definition_id = $2")
            .bind(*machine_id.as_uuid())
            .bind(*definition_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::parse_instance).transpose()
    }

    async fn get_instance(&self, id: MetricInstanceId) -> Result<Option<MetricInstance>, StoreError> {
        let row = sqlx::query("SELECT * FROM metric_instances WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::parse_instance).transpose()
    }

    async fn insert_instance(&self, instance: MetricInstance) -> Result<(), StoreError> {
        let last_value = instance
            .last_value
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        sqlx::query(
            "INSERT INTO metric_instances
                (id, machine_id, definition_id, alert_enabled, paused, last_value, last_value_at, state)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(*instance.id.as_uuid())
        .bind(*instance.machine_id.as_uuid())
        .bind(*instance.definition_id.as_uuid())
        .bind(instance.alert_enabled)
        .bind(instance.paused)
        .bind(last_value)
        .bind(instance.last_value_at)
        .bind(instance_state_str(instance.state))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_instance(&self, instance: &MetricInstance) -> Result<(), StoreError> {
        let last_value = instance
            .last_value
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        sqlx::query(
            "UPDATE metric_instances
             SET alert_enabled = $2, paused = $3, last_value = $4, last_value_at = $5, state = $6
             WHERE id = $1",
        )
        .bind(*instance.id.as_uuid())
        .bind(instance.alert_enabled)
        .bind(instance.paused)
        .bind(last_value)
        .bind(instance.last_value_at)
        .bind(instance_state_str(instance.state))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_threshold(
        &self,
        metric_instance_id: MetricInstanceId,
    ) -> Result<Option<Threshold>, StoreError> {
        let row = sqlx::query("SELECT * FROM thresholds WHERE metric_instance_id = $1")
            .bind(*metric_instance_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::parse_threshold).transpose()
    }

    async fn upsert_threshold(&self, threshold: Threshold) -> Result<(), StoreError> {
        let value = serde_json::to_value(&threshold.value).map_err(|e| StoreError::Backend(e.to_string()))?;
        sqlx::query(
            "INSERT INTO thresholds (id, metric_instance_id, comparison, value, severity)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (metric_instance_id) DO UPDATE
             SET comparison = EXCLUDED.comparison, value = EXCLUDED.value, severity = EXCLUDED.severity",
        )
        .bind(*threshold.id.as_uuid())
        .bind(*threshold.metric_instance_id.as_uuid())
        .bind(threshold.comparison.to_string())
        .bind(value)
        .bind(threshold.severity.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_machines(&self, client_id: ClientId) -> Result<Vec<Machine>, StoreError> {
        let rows = sqlx::query("SELECT * FROM machines WHERE client_id = $1 ORDER BY registered_at")
            .bind(*client_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::parse_machine).collect()
    }

    async fn insert_sample(&self, sample: Sample) -> Result<(), StoreError> {
        let value = serde_json::to_value(&sample.value).map_err(|e| StoreError::Backend(e.to_string()))?;
        sqlx::query(
            "INSERT INTO samples (id, metric_instance_id, ts, sent_at, value) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(*sample.id.as_uuid())
        .bind(*sample.metric_instance_id.as_uuid())
        .bind(sample.ts)
        .bind(sample.sent_at)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn try_insert_http_target(&self, target: HttpTarget) -> Result<(), StoreError> {
        let codes: Vec<i16> = target.accepted_status_codes.iter().map(|c| *c as i16).collect();
        sqlx::query(
            "INSERT INTO http_targets
                (id, client_id, name, url, method, accepted_status_codes, timeout_ms,
                 check_interval_s, is_active, last_check_at, last_status, last_latency_ms)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(*target.id.as_uuid())
        .bind(*target.client_id.as_uuid())
        .bind(&target.name)
        .bind(&target.url)
        .bind(target.method.to_string())
        .bind(&codes)
        .bind(target.timeout_ms as i64)
        .bind(target.check_interval_s as i64)
        .bind(target.is_active)
        .bind(target.last_check_at)
        .bind(target.last_status.map(|s| s as i16))
        .bind(target.last_latency_ms.map(|v| v as i64))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_http_target_by_url(
        &self,
        client_id: ClientId,
        url: &str,
    ) -> Result<Option<HttpTarget>, StoreError> {
        let row = sqlx::query("SELECT * FROM http_targets WHERE client_id = $1 AND url = $2")
            .bind(*client_id.as_uuid())
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::parse_http_target).transpose()
    }

    async fn list_due_http_targets(&self, now: DateTime<Utc>) -> Result<Vec<HttpTarget>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM http_targets
             WHERE is_active AND (
                last_check_at IS NULL
                OR EXTRACT(EPOCH FROM ($1 - last_check_at)) >= check_interval_s
             )",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::parse_http_target).collect()
    }

    async fn list_http_targets(&self, client_id: ClientId) -> Result<Vec<HttpTarget>, StoreError> {
        let rows = sqlx::query("SELECT * FROM http_targets WHERE client_id = $1 ORDER BY name")
            .bind(*client_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::parse_http_target).collect()
    }

    async fn delete_http_target(&self, client_id: ClientId, id: HttpTargetId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM http_targets WHERE id = $1 AND client_id = $2")
            .bind(*id.as_uuid())
            .bind(*client_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_http_target_check(&self, target: &HttpTarget) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE http_targets SET last_check_at = $2, last_status = $3, last_latency_ms = $4 WHERE id = $1",
        )
        .bind(*target.id.as_uuid())
        .bind(target.last_check_at)
        .bind(target.last_status.map(|s| s as i16))
        .bind(target.last_latency_ms.map(|v| v as i64))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn try_open_incident(
        &self,
        subject: Subject,
        severity: Severity,
    ) -> Result<OpenOutcome, StoreError> {
        // Incident state transitions are serialized per subject: the partial
        // unique index on (status = 'OPEN') already makes a double-open
        // impossible, but without the lock two racing evaluators can both
        // hit the unique violation branch and redundantly re-observe the
        // same incident. The advisory lock is scoped to this transaction and
        // released automatically on commit or rollback.
        let incident = Incident::open(subject, severity);
        let lock_key = subject_lock_key(&subject.canonical_key());
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(lock_key)
            .execute(&mut *tx)
            .await?;

        let insert = sqlx::query(
            "INSERT INTO incidents
                (id, client_id, http_target_id, metric_instance_id, machine_id, status, severity,
                 opened_at, resolved_at, last_notified_at, last_observed_at)
             VALUES ($1, $2, $3, $4, $5, 'OPEN', $6, $7, NULL, NULL, $8)",
        )
        .bind(*incident.id.as_uuid())
        .bind(*incident.client_id.as_uuid())
        .bind(incident.http_target_id.map(|id| *id.as_uuid()))
        .bind(incident.metric_instance_id.map(|id| *id.as_uuid()))
        .bind(incident.machine_id.map(|id| *id.as_uuid()))
        .bind(severity.to_string())
        .bind(incident.opened_at)
        .bind(incident.last_observed_at)
        .execute(&mut *tx)
        .await;

        match insert {
            Ok(_) => {
                tx.commit().await?;
                Ok(OpenOutcome::Opened(incident))
            }
            Err(err) => match StoreError::from(err) {
                StoreError::UniqueViolation(_) => {
                    let existing = Self::fetch_open_incident(&mut tx, subject)
                        .await?
                        .ok_or_else(|| StoreError::Backend("unique violation but no open incident found".into()))?;
                    sqlx::query("UPDATE incidents SET last_observed_at = now() WHERE id = $1")
                        .bind(*existing.id.as_uuid())
                        .execute(&mut *tx)
                        .await?;
                    let refreshed = Self::fetch_open_incident(&mut tx, subject).await?.unwrap_or(existing);
                    tx.commit().await?;
                    Ok(OpenOutcome::AlreadyOpen(refreshed))
                }
                other => Err(other),
            },
        }
    }

    async fn resolve_incident(&self, subject: Subject) -> Result<Option<Incident>, StoreError> {
        let lock_key = subject_lock_key(&subject.canonical_key());
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(lock_key)
            .execute(&mut *tx)
            .await?;

        let (http_target_id, metric_instance_id, machine_id) = subject_columns(subject);
        let row = sqlx::query(
            "UPDATE incidents SET status = 'RESOLVED', resolved_at = now()
             WHERE status = 'OPEN'
               AND http_target_id IS NOT DISTINCT FROM $1
               AND metric_instance_id IS NOT DISTINCT FROM $2
               AND machine_id IS NOT DISTINCT FROM $3
             RETURNING *",
        )
        .bind(http_target_id)
        .bind(metric_instance_id)
        .bind(machine_id)
        .fetch_optional(&mut *tx)
        .await?;
        let incident = row.as_ref().map(Self::parse_incident).transpose()?;
        tx.commit().await?;
        Ok(incident)
    }

    async fn find_open_incident(&self, subject: Subject) -> Result<Option<Incident>, StoreError> {
        let (http_target_id, metric_instance_id, machine_id) = subject_columns(subject);
        let row = sqlx::query(
            "SELECT * FROM incidents
             WHERE status = 'OPEN'
               AND http_target_id IS NOT DISTINCT FROM $1
               AND metric_instance_id IS NOT DISTINCT FROM $2
               AND machine_id IS NOT DISTINCT FROM $3",
        )
        .bind(http_target_id)
        .bind(metric_instance_id)
        .bind(machine_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::parse_incident).transpose()
    }

    async fn list_incidents(&self, client_id: ClientId, open_only: bool) -> Result<Vec<Incident>, StoreError> {
        let rows = if open_only {
            sqlx::query("SELECT * FROM incidents WHERE client_id = $1 AND status = 'OPEN' ORDER BY opened_at DESC")
                .bind(*client_id.as_uuid())
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query("SELECT * FROM incidents WHERE client_id = $1 ORDER BY opened_at DESC")
                .bind(*client_id.as_uuid())
                .fetch_all(&self.pool)
                .await?
        };
        rows.iter().map(Self::parse_incident).collect()
    }

    async fn get_incident(&self, incident_id: IncidentId) -> Result<Option<Incident>, StoreError> {
        let row = sqlx::query("SELECT * FROM incidents WHERE id = $1")
            .bind(*incident_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::parse_incident).transpose()
    }

    async fn mark_incident_notified(&self, incident_id: IncidentId, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query("UPDATE incidents SET last_notified_at = $2 WHERE id = $1")
            .bind(*incident_id.as_uuid())
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_notification(&self, log: NotificationLog) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO notification_log
                (id, client_id, incident_id, provider, kind, recipient, status, sent_at, created_at, error, attempts)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(*log.id.as_uuid())
        .bind(*log.client_id.as_uuid())
        .bind(log.incident_id.map(|id| *id.as_uuid()))
        .bind(log.provider.to_string())
        .bind(notification_kind_str(log.kind))
        .bind(&log.recipient)
        .bind(notification_status_str(log.status))
        .bind(log.sent_at)
        .bind(log.created_at)
        .bind(&log.error)
        .bind(log.attempts as i32)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_notification(&self, log: &NotificationLog) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE notification_log SET status = $2, sent_at = $3, error = $4, attempts = $5 WHERE id = $1",
        )
        .bind(*log.id.as_uuid())
        .bind(notification_status_str(log.status))
        .bind(log.sent_at)
        .bind(&log.error)
        .bind(log.attempts as i32)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn last_successful_send(
        &self,
        subject: Subject,
        kind: NotificationKind,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let (http_target_id, metric_instance_id, machine_id) = subject_columns(subject);
        let row = sqlx::query(
            "SELECT MAX(n.sent_at) as last_sent
             FROM notification_log n
             JOIN incidents i ON i.id = n.incident_id
             WHERE n.kind = $1 AND n.status = 'success'
               AND i.http_target_id IS NOT DISTINCT FROM $2
               AND i.metric_instance_id IS NOT DISTINCT FROM $3
               AND i.machine_id IS NOT DISTINCT FROM $4",
        )
        .bind(notification_kind_str(kind))
        .bind(http_target_id)
        .bind(metric_instance_id)
        .bind(machine_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("last_sent")?)
    }

    async fn list_notifications_for_incident(
        &self,
        incident_id: IncidentId,
    ) -> Result<Vec<NotificationLog>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM notification_log WHERE incident_id = $1 ORDER BY created_at DESC",
        )
        .bind(*incident_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::parse_notification).collect()
    }

    async fn get_settings(&self, client_id: ClientId) -> Result<ClientSettings, StoreError> {
        let row = sqlx::query("SELECT * FROM client_settings WHERE client_id = $1")
            .bind(*client_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            None => Ok(ClientSettings::defaults_for(client_id)),
            Some(row) => Ok(ClientSettings {
                client_id,
                notification_email: row.try_get::<Option<String>, _>("notification_email")?.unwrap_or_default(),
                slack_webhook_url: row.try_get::<Option<String>, _>("slack_webhook_url")?.unwrap_or_default(),
                slack_channel_name: row.try_get("slack_channel_name")?,
                grace_period_seconds: row.try_get::<i64, _>("grace_period_seconds")? as u64,
                reminder_notification_seconds: row
                    .try_get::<Option<i64>, _>("reminder_notification_seconds")?
                    .unwrap_or(0) as u64,
                alert_grouping_enabled: row.try_get("alert_grouping_enabled")?,
                notify_on_resolve: row.try_get("notify_on_resolve")?,
                heartbeat_threshold_minutes: row.try_get("heartbeat_threshold_minutes")?,
                consecutive_failures_threshold: row
                    .try_get::<Option<i32>, _>("consecutive_failures_threshold")?
                    .map(|v| v as u32),
            }),
        }
    }

    async fn put_settings(&self, settings: ClientSettings) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO client_settings
                (client_id, notification_email, slack_webhook_url, slack_channel_name,
                 grace_period_seconds, reminder_notification_seconds, alert_grouping_enabled,
                 notify_on_resolve, heartbeat_threshold_minutes, consecutive_failures_threshold)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT (client_id) DO UPDATE SET
                notification_email = EXCLUDED.notification_email,
                slack_webhook_url = EXCLUDED.slack_webhook_url,
                slack_channel_name = EXCLUDED.slack_channel_name,
                grace_period_seconds = EXCLUDED.grace_period_seconds,
                reminder_notification_seconds = EXCLUDED.reminder_notification_seconds,
                alert_grouping_enabled = EXCLUDED.alert_grouping_enabled,
                notify_on_resolve = EXCLUDED.notify_on_resolve,
                heartbeat_threshold_minutes = EXCLUDED.heartbeat_threshold_minutes,
                consecutive_failures_threshold = EXCLUDED.consecutive_failures_threshold",
        )
        .bind(*settings.client_id.as_uuid())
        .bind(&settings.notification_email)
        .bind(&settings.slack_webhook_url)
        .bind(&settings.slack_channel_name)
        .bind(settings.grace_period_seconds as i64)
        .bind(settings.reminder_notification_seconds as i64)
        .bind(settings.alert_grouping_enabled)
        .bind(settings.notify_on_resolve)
        .bind(settings.heartbeat_threshold_minutes)
        .bind(settings.consecutive_failures_threshold.map(|v| v as i32))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        PostgresStore::is_healthy(self).await
    }
}

fn value_kind_str(kind: ValueKind) -> &'static str {
    match kind {
        ValueKind::Number => "number",
        ValueKind::Bool => "bool",
        ValueKind::String => "string",
    }
}

fn notification_kind_str(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::Open => "open",
        NotificationKind::Reminder => "reminder",
        NotificationKind::Resolve => "resolve",
    }
}

fn notification_status_str(status: NotificationStatus) -> &'static str {
    match status {
        NotificationStatus::Pending => "pending",
        NotificationStatus::Success => "success",
        NotificationStatus::Failed => "failed",
    }
}
