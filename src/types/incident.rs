//! Incidents: durable records that a subject is currently bad.
//!
//! At most one OPEN incident exists per subject; the invariant is enforced
//! by the store's partial unique indexes, not application-level locking
//! (see the incident manager).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ClientId, HttpTargetId, IncidentId, MachineId, MetricInstanceId};
use super::threshold::Severity;

/// The keyed target of an incident: an HTTP target, a metric instance, or a
/// machine's heartbeat, scoped to one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Subject {
    /// An HTTP endpoint probe.
    Http {
        /// Owning tenant.
        client_id: ClientId,
        /// The probed target.
        http_target_id: HttpTargetId,
    },
    /// A metric instance threshold.
    Metric {
        /// Owning tenant.
        client_id: ClientId,
        /// The bound metric instance.
        metric_instance_id: MetricInstanceId,
    },
    /// A machine's liveness, synthetic: not backed by a threshold, opened by
    /// the heartbeat scan and resolved by the machine's next ingest.
    Heartbeat {
        /// Owning tenant.
        client_id: ClientId,
        /// The silent machine.
        machine_id: MachineId,
    },
}

impl Subject {
    /// The owning tenant for this subject.
    pub fn client_id(&self) -> ClientId {
        match self {
            Subject::Http { client_id, .. } => *client_id,
            Subject::Metric { client_id, .. } => *client_id,
            Subject::Heartbeat { client_id, .. } => *client_id,
        }
    }

    /// A stable string key suitable for hashing (advisory locks, in-flight sets).
    pub fn canonical_key(&self) -> String {
        match self {
            Subject::Http {
                client_id,
                http_target_id,
            } => format!("http:{client_id}:{http_target_id}"),
            Subject::Metric {
                client_id,
                metric_instance_id,
            } => format!("metric:{client_id}:{metric_instance_id}"),
            Subject::Heartbeat {
                client_id,
                machine_id,
            } => format!("heartbeat:{client_id}:{machine_id}"),
        }
    }
}

/// Lifecycle status of an Incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IncidentStatus {
    /// The subject is currently unhealthy.
    Open,
    /// The subject has returned to healthy.
    Resolved,
}

/// A durable record that a subject is (or was) unhealthy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    /// Unique identifier.
    pub id: IncidentId,
    /// Owning tenant.
    pub client_id: ClientId,
    /// Set when this incident is HTTP-target based.
    pub http_target_id: Option<HttpTargetId>,
    /// Set when this incident is metric-instance based.
    pub metric_instance_id: Option<MetricInstanceId>,
    /// Set when this incident is a machine heartbeat.
    pub machine_id: Option<MachineId>,
    /// Current status.
    pub status: IncidentStatus,
    /// Severity of the threshold/condition that opened this incident.
    pub severity: Severity,
    /// When the incident opened.
    pub opened_at: DateTime<Utc>,
    /// When the incident resolved, if it has.
    pub resolved_at: Option<DateTime<Utc>>,
    /// When a notification for this incident was last sent.
    pub last_notified_at: Option<DateTime<Utc>>,
    /// Timestamp of the most recent observation attached while OPEN
    /// (updated on a re-open conflict; see incident manager).
    pub last_observed_at: DateTime<Utc>,
}

impl Incident {
    /// Open a new incident for the given subject.
    pub fn open(subject: Subject, severity: Severity) -> Self {
        let now = Utc::now();
        let (http_target_id, metric_instance_id, machine_id) = match subject {
            Subject::Http { http_target_id, .. } => (Some(http_target_id), None, None),
            Subject::Metric {
                metric_instance_id, ..
            } => (None, Some(metric_instance_id), None),
            Subject::Heartbeat { machine_id, .. } => (None, None, Some(machine_id)),
        };
        Self {
            id: IncidentId::new(),
            client_id: subject.client_id(),
            http_target_id,
            metric_instance_id,
            machine_id,
            status: IncidentStatus::Open,
            severity,
            opened_at: now,
            resolved_at: None,
            last_notified_at: None,
            last_observed_at: now,
        }
    }

    /// The subject this incident belongs to.
    pub fn subject(&self) -> Subject {
        match (self.http_target_id, self.metric_instance_id, self.machine_id) {
            (Some(http_target_id), None, None) => Subject::Http {
                client_id: self.client_id,
                http_target_id,
            },
            (None, Some(metric_instance_id), None) => Subject::Metric {
                client_id: self.client_id,
                metric_instance_id,
            },
            (None, None, Some(machine_id)) => Subject::Heartbeat {
                client_id: self.client_id,
                machine_id,
            },
            _ => unreachable!("incident must have exactly one subject column set"),
        }
    }

    /// Mark this incident resolved.
    pub fn resolve(&mut self) {
        self.status = IncidentStatus::Resolved;
        self.resolved_at = Some(Utc::now());
    }

    /// Attach a fresh observation to an already-open incident (re-open conflict path).
    pub fn touch_observed(&mut self) {
        self.last_observed_at = Utc::now();
    }

    /// Structured log of an incident lifecycle transition.
    pub fn log_transition(&self, event: &str) {
        tracing::info!(
            incident_id = %self.id,
            client_id = %self.client_id,
            subject = %self.subject().canonical_key(),
            status = ?self.status,
            severity = %self.severity,
            event,
            "incident transition"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_sets_exactly_one_subject_column() {
        let subject = Subject::Http {
            client_id: ClientId::new(),
            http_target_id: HttpTargetId::new(),
        };
        let incident = Incident::open(subject, Severity::Critical);
        assert!(incident.http_target_id.is_some());
        assert!(incident.metric_instance_id.is_none());
        assert!(incident.machine_id.is_none());
        assert_eq!(incident.status, IncidentStatus::Open);
        assert_eq!(incident.subject(), subject);
    }

    #[test]
    fn heartbeat_subject_round_trips_through_open() {
        let subject = Subject::Heartbeat {
            client_id: ClientId::new(),
            machine_id: MachineId::new(),
        };
        let incident = Incident::open(subject, Severity::Critical);
        assert!(incident.machine_id.is_some());
        assert!(incident.http_target_id.is_none());
        assert!(incident.metric_instance_id.is_none());
        assert_eq!(incident.subject(), subject);
    }

    #[test]
    fn resolve_sets_resolved_at() {
        let subject = Subject::Metric {
            client_id: ClientId::new(),
            metric_instance_id: MetricInstanceId::new(),
        };
        let mut incident = Incident::open(subject, Severity::Warning);
        assert!(incident.resolved_at.is_none());
        incident.resolve();
        assert_eq!(incident.status, IncidentStatus::Resolved);
        assert!(incident.resolved_at.is_some());
    }

    #[test]
    fn canonical_key_distinguishes_http_and_metric_subjects() {
        let client_id = ClientId::new();
        let http = Subject::Http {
            client_id,
            http_target_id: HttpTargetId::new(),
        };
        let metric = Subject::Metric {
            client_id,
            metric_instance_id: MetricInstanceId::new(),
        };
        assert_ne!(http.canonical_key(), metric.canonical_key());
    }
}
