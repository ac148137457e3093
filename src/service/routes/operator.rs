//! Operator surface: incidents, machines, settings, and per-instance
//! alerting controls.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::types::{
    Comparison, Incident, Machine, MetricInstanceId, MetricValue, NotificationLog, Severity,
    Threshold, ThresholdId,
};

use super::super::auth::OperatorAuth;
use super::super::state::AppState;

/// Query string for `GET /api/v1/incidents`.
#[derive(Debug, Deserialize)]
pub struct ListIncidentsQuery {
    #[serde(default)]
    pub open_only: bool,
}

/// Wire representation of an incident.
#[derive(Debug, Serialize)]
pub struct IncidentDto {
    pub id: String,
    pub status: String,
    pub severity: String,
    pub opened_at: chrono::DateTime<chrono::Utc>,
    pub resolved_at: Option<chrono::DateTime<chrono::Utc>>,
    pub last_notified_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<Incident> for IncidentDto {
    fn from(incident: Incident) -> Self {
        Self {
            id: incident.id.to_string(),
            status: format!("{:?}", incident.status).to_uppercase(),
            severity: incident.severity.to_string(),
            opened_at: incident.opened_at,
            resolved_at: incident.resolved_at,
            last_notified_at: incident.last_notified_at,
        }
    }
}

/// `GET /api/v1/incidents`
pub async fn list_incidents(
    State(state): State<Arc<AppState>>,
    auth: OperatorAuth,
    Query(query): Query<ListIncidentsQuery>,
) -> Result<Json<Vec<IncidentDto>>, AppError> {
    let incidents = state
        .store
        .list_incidents(auth.client_id, query.open_only)
        .await
        .map_err(|e| AppError::Transient(e.to_string()))?;
    Ok(Json(incidents.into_iter().map(IncidentDto::from).collect()))
}

/// Wire representation of a notification attempt.
#[derive(Debug, Serialize)]
pub struct NotificationLogDto {
    pub id: String,
    pub provider: String,
    pub kind: String,
    pub recipient: String,
    pub status: String,
    pub sent_at: Option<chrono::DateTime<chrono::Utc>>,
    pub attempts: u32,
    pub error: Option<String>,
}

impl From<NotificationLog> for NotificationLogDto {
    fn from(log: NotificationLog) -> Self {
        Self {
            id: log.id.to_string(),
            provider: log.provider.to_string(),
            kind: format!("{:?}", log.kind).to_lowercase(),
            recipient: log.recipient,
            status: format!("{:?}", log.status).to_lowercase(),
            sent_at: log.sent_at,
            attempts: log.attempts,
            error: log.error,
        }
    }
}

/// `GET /api/v1/incidents/:id/notifications`
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    auth: OperatorAuth,
    Path(incident_id): Path<crate::types::IncidentId>,
) -> Result<Json<Vec<NotificationLogDto>>, AppError> {
    let incident = state
        .store
        .get_incident(incident_id)
        .await
        .map_err(|e| AppError::Transient(e.to_string()))?
        .ok_or_else(|| AppError::NotFound(format!("incident {incident_id} not found")))?;
    if incident.client_id != auth.client_id {
        return Err(AppError::NotFound(format!("incident {incident_id} not found")));
    }

    let logs = state
        .store
        .list_notifications_for_incident(incident_id)
        .await
        .map_err(|e| AppError::Transient(e.to_string()))?;
    Ok(Json(logs.into_iter().map(NotificationLogDto::from).collect()))
}

/// Wire representation of a monitored machine.
#[derive(Debug, Serialize)]
pub struct MachineDto {
    pub id: String,
    pub hostname: String,
    pub os: String,
    pub is_active: bool,
    pub last_seen: chrono::DateTime<chrono::Utc>,
}

impl From<Machine> for MachineDto {
    fn from(machine: Machine) -> Self {
        Self {
            id: machine.id.to_string(),
            hostname: machine.hostname,
            os: machine.os,
            is_active: machine.is_active,
            last_seen: machine.last_seen,
        }
    }
}

/// `GET /api/v1/machines`
pub async fn list_machines(
    State(state): State<Arc<AppState>>,
    auth: OperatorAuth,
) -> Result<Json<Vec<MachineDto>>, AppError> {
    let machines = state
        .store
        .list_machines(auth.client_id)
        .await
        .map_err(|e| AppError::Transient(e.to_string()))?;
    Ok(Json(machines.into_iter().map(MachineDto::from).collect()))
}

/// Wire representation of per-client settings.
#[derive(Debug, Serialize, Deserialize)]
pub struct SettingsDto {
    pub notification_email: String,
    pub slack_webhook_url: String,
    pub slack_channel_name: Option<String>,
    pub grace_period_seconds: u64,
    pub reminder_notification_seconds: u64,
    pub alert_grouping_enabled: bool,
    pub notify_on_resolve: bool,
    pub heartbeat_threshold_minutes: i64,
    pub consecutive_failures_threshold: Option<u32>,
}

/// `GET /api/v1/settings`
pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    auth: OperatorAuth,
) -> Result<Json<SettingsDto>, AppError> {
    let settings = state
        .store
        .get_settings(auth.client_id)
        .await
        .map_err(|e| AppError::Transient(e.to_string()))?;
    Ok(Json(SettingsDto {
        notification_email: settings.notification_email,
        slack_webhook_url: settings.slack_webhook_url,
        slack_channel_name: settings.slack_channel_name,
        grace_period_seconds: settings.grace_period_seconds,
        reminder_notification_seconds: settings.reminder_notification_seconds,
        alert_grouping_enabled: settings.alert_grouping_enabled,
        notify_on_resolve: settings.notify_on_resolve,
        heartbeat_threshold_minutes: settings.heartbeat_threshold_minutes,
        consecutive_failures_threshold: settings.consecutive_failures_threshold,
    }))
}

/// `PUT /api/v1/settings`
pub async fn put_settings(
    State(state): State<Arc<AppState>>,
    auth: OperatorAuth,
    Json(body): Json<SettingsDto>,
) -> Result<Json<SettingsDto>, AppError> {
    let settings = crate::types::ClientSettings {
        client_id: auth.client_id,
        notification_email: body.notification_email,
        slack_webhook_url: body.slack_webhook_url,
        slack_channel_name: body.slack_channel_name,
        grace_period_seconds: body.grace_period_seconds,
        reminder_notification_seconds: body.reminder_notification_seconds,
        alert_grouping_enabled: body.alert_grouping_enabled,
        notify_on_resolve: body.notify_on_resolve,
        heartbeat_threshold_minutes: body.heartbeat_threshold_minutes,
        consecutive_failures_threshold: body.consecutive_failures_threshold,
    };
    state
        .store
        .put_settings(settings.clone())
        .await
        .map_err(|e| AppError::Transient(e.to_string()))?;
    Ok(Json(SettingsDto {
        notification_email: settings.notification_email,
        slack_webhook_url: settings.slack_webhook_url,
        slack_channel_name: settings.slack_channel_name,
        grace_period_seconds: settings.grace_period_seconds,
        reminder_notification_seconds: settings.reminder_notification_seconds,
        alert_grouping_enabled: settings.alert_grouping_enabled,
        notify_on_resolve: settings.notify_on_resolve,
        heartbeat_threshold_minutes: settings.heartbeat_threshold_minutes,
        consecutive_failures_threshold: settings.consecutive_failures_threshold,
    }))
}

/// Body of the alerting/pause PATCH endpoints.
#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub enabled: bool,
}

/// `PATCH /api/v1/metric-instances/:id/alerting`
pub async fn set_alerting(
    State(state): State<Arc<AppState>>,
    _auth: OperatorAuth,
    Path(id): Path<MetricInstanceId>,
    Json(body): Json<ToggleRequest>,
) -> Result<(), AppError> {
    let mut instance = state
        .store
        .get_instance(id)
        .await
        .map_err(|e| AppError::Transient(e.to_string()))?
        .ok_or_else(|| AppError::NotFound(format!("metric instance {id} not found")))?;
    instance.alert_enabled = body.enabled;
    state
        .store
        .update_instance(&instance)
        .await
        .map_err(|e| AppError::Transient(e.to_string()))
}

/// `PATCH /api/v1/metric-instances/:id/pause`
pub async fn set_paused(
    State(state): State<Arc<AppState>>,
    _auth: OperatorAuth,
    Path(id): Path<MetricInstanceId>,
    Json(body): Json<ToggleRequest>,
) -> Result<(), AppError> {
    let mut instance = state
        .store
        .get_instance(id)
        .await
        .map_err(|e| AppError::Transient(e.to_string()))?
        .ok_or_else(|| AppError::NotFound(format!("metric instance {id} not found")))?;
    instance.paused = body.enabled;
    state
        .store
        .update_instance(&instance)
        .await
        .map_err(|e| AppError::Transient(e.to_string()))
}

/// Body of `POST /api/v1/metric-instances/:id/threshold`.
#[derive(Debug, Deserialize)]
pub struct SetThresholdRequest {
    pub comparison: Comparison,
    pub value: MetricValue,
    pub severity: Severity,
}

/// `POST /api/v1/metric-instances/:id/threshold`
pub async fn set_threshold(
    State(state): State<Arc<AppState>>,
    _auth: OperatorAuth,
    Path(id): Path<MetricInstanceId>,
    Json(body): Json<SetThresholdRequest>,
) -> Result<(), AppError> {
    let threshold = Threshold {
        id: ThresholdId::new(),
        metric_instance_id: id,
        comparison: body.comparison,
        value: body.value,
        severity: body.severity,
    };
    state
        .store
        .upsert_threshold(threshold)
        .await
        .map_err(|e| AppError::Transient(e.to_string()))
}
