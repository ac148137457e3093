//! Threshold evaluator: the only component that drives a MetricInstance's
//! or HttpTarget's state, consuming the pure [`crate::policy`] functions.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::ingest::EvaluateIntent;
use crate::policy::{evaluate, GateOutcome, GracePolicy, PendingState, Verdict};
use crate::prober::ProbeOutcome;
use crate::store::Store;
use crate::types::{InstanceState, Severity, Subject};

/// An open/resolve decision produced by the evaluator, consumed by the
/// incident manager.
#[derive(Debug, Clone, Copy)]
pub enum IncidentIntent {
    /// A transition into CRITICAL that has satisfied its gate.
    Open { subject: Subject, severity: Severity },
    /// A transition back to NORMAL (or an operator-suppressed instance).
    Resolve { subject: Subject },
}

/// Per-subject grace/consecutive-failure state, held in memory for the
/// lifetime of the process. Not persisted: a restart resets any in-flight
/// grace window, which only delays (never skips) a correct incident open.
#[derive(Default)]
pub struct Evaluator {
    pending: Mutex<HashMap<String, PendingState>>,
}

impl Evaluator {
    /// Construct an evaluator with no pending state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate a metric instance's newest sample against its threshold.
    pub async fn evaluate_metric(
        &self,
        store: &dyn Store,
        intent: EvaluateIntent,
    ) -> Result<Option<IncidentIntent>, crate::error::AppError> {
        let mut instance = store
            .get_instance(intent.metric_instance_id)
            .await
            .map_err(|e| crate::error::AppError::Transient(e.to_string()))?
            .ok_or_else(|| crate::error::AppError::NotFound("metric instance".into()))?;

        let subject = Subject::Metric {
            client_id: intent.client_id,
            metric_instance_id: instance.id,
        };

        if instance.is_suppressed() {
            let previous = instance.state;
            instance.state = InstanceState::Unknown;
            store
                .update_instance(&instance)
                .await
                .map_err(|e| crate::error::AppError::Transient(e.to_string()))?;
            return Ok(if previous == InstanceState::Critical {
                Some(IncidentIntent::Resolve { subject })
            } else {
                None
            });
        }

        let threshold = store
            .find_threshold(instance.id)
            .await
            .map_err(|e| crate::error::AppError::Transient(e.to_string()))?;

        let Some(threshold) = threshold else {
            instance.state = InstanceState::Unknown;
            store
                .update_instance(&instance)
                .await
                .map_err(|e| crate::error::AppError::Transient(e.to_string()))?;
            return Ok(None);
        };

        let Some(value) = instance.last_value.clone() else {
            return Ok(None);
        };

        let verdict = evaluate(&threshold, &value);
        let settings = store
            .get_settings(intent.client_id)
            .await
            .map_err(|e| crate::error::AppError::Transient(e.to_string()))?;
        let policy = GracePolicy {
            grace_period_seconds: settings.grace_period_seconds,
            consecutive_failures_threshold: settings.consecutive_failures_threshold,
        };

        let gated = self.gate(&subject, verdict, &policy);
        let previous = instance.state;
        let intent = self.transition(subject, previous, gated, threshold.severity);
        instance.state = gated_state(gated);
        store
            .update_instance(&instance)
            .await
            .map_err(|e| crate::error::AppError::Transient(e.to_string()))?;
        Ok(intent)
    }

    /// Evaluate one HTTP probe outcome against its client's grace policy.
    pub async fn evaluate_http(
        &self,
        store: &dyn Store,
        outcome: ProbeOutcome,
    ) -> Result<Option<IncidentIntent>, crate::error::AppError> {
        let subject = Subject::Http {
            client_id: outcome.client_id,
            http_target_id: outcome.http_target_id,
        };
        let verdict = if outcome.ok { Verdict::Normal } else { Verdict::Critical };
        let settings = store
            .get_settings(outcome.client_id)
            .await
            .map_err(|e| crate::error::AppError::Transient(e.to_string()))?;
        let policy = GracePolicy {
            grace_period_seconds: settings.grace_period_seconds,
            consecutive_failures_threshold: settings.consecutive_failures_threshold,
        };
        let gated = self.gate(&subject, verdict, &policy);
        Ok(match gated {
            GateOutcome::Open => Some(IncidentIntent::Open {
                subject,
                severity: Severity::Critical,
            }),
            GateOutcome::Clear => Some(IncidentIntent::Resolve { subject }),
            GateOutcome::Pending => None,
        })
    }

    /// Evaluate a synthetic heartbeat subject. The heartbeat scan has
    /// already applied the client's `heartbeat_threshold_minutes` to decide
    /// a machine is overdue, so there is no further grace to apply here: a
    /// CRITICAL verdict opens immediately, same as any other gate with no
    /// grace period or consecutive-failure requirement configured.
    pub fn evaluate_heartbeat(&self, subject: Subject) -> Option<IncidentIntent> {
        let gated = self.gate(&subject, Verdict::Critical, &GracePolicy::immediate());
        match gated {
            GateOutcome::Open => Some(IncidentIntent::Open {
                subject,
                severity: Severity::Critical,
            }),
            GateOutcome::Clear | GateOutcome::Pending => None,
        }
    }

    fn gate(&self, subject: &Subject, verdict: Verdict, policy: &GracePolicy) -> GateOutcome {
        let mut pending = self.pending.lock();
        let state = pending.entry(subject.canonical_key()).or_default();
        state.advance(verdict, policy, chrono::Utc::now())
    }

    fn transition(
        &self,
        subject: Subject,
        previous: InstanceState,
        gated: GateOutcome,
        severity: Severity,
    ) -> Option<IncidentIntent> {
        match (previous, gated) {
            (InstanceState::Critical, GateOutcome::Clear) => Some(IncidentIntent::Resolve { subject }),
            (InstanceState::Critical, GateOutcome::Open) => None, // already open, re-observed
            (_, GateOutcome::Open) if previous != InstanceState::Critical => {
                Some(IncidentIntent::Open { subject, severity })
            }
            _ => None,
        }
    }
}

fn gated_state(outcome: GateOutcome) -> InstanceState {
    match outcome {
        GateOutcome::Clear => InstanceState::Normal,
        GateOutcome::Pending => InstanceState::Normal,
        GateOutcome::Open => InstanceState::Critical,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use crate::types::{ClientId, Comparison, MachineId, MetricDefinitionId, MetricValue, Threshold};

    async fn seeded_instance(store: &InMemoryStore) -> (ClientId, crate::types::MetricInstanceId) {
        let client_id = ClientId::new();
        let definition = crate::types::MetricDefinition::new(client_id, "cpu", crate::types::ValueKind::Number);
        store.insert_definition(definition.clone()).await.unwrap();
        let mut instance = crate::types::MetricInstance::new(MachineId::new(), definition.id);
        instance.record_value(MetricValue::Number { n: 99.0 }, chrono::Utc::now());
        store.insert_instance(instance.clone()).await.unwrap();
        store.seed_threshold(Threshold::new(instance.id, Comparison::Gt, MetricValue::Number { n: 90.0 }, Severity::Critical));
        (client_id, instance.id)
    }

    #[tokio::test]
    async fn first_critical_with_no_grace_opens_immediately() {
        let store = InMemoryStore::new();
        let (client_id, instance_id) = seeded_instance(&store).await;
        let evaluator = Evaluator::new();

        let intent = evaluator
            .evaluate_metric(&store, EvaluateIntent { client_id, metric_instance_id: instance_id })
            .await
            .unwrap();
        assert!(matches!(intent, Some(IncidentIntent::Open { .. })));
    }

    #[tokio::test]
    async fn missing_threshold_leaves_instance_unknown_with_no_intent() {
        let store = InMemoryStore::new();
        let client_id = ClientId::new();
        let definition = crate::types::MetricDefinition::new(client_id, "cpu", crate::types::ValueKind::Number);
        store.insert_definition(definition.clone()).await.unwrap();
        let mut instance = crate::types::MetricInstance::new(MachineId::new(), definition.id);
        instance.record_value(MetricValue::Number { n: 1.0 }, chrono::Utc::now());
        store.insert_instance(instance.clone()).await.unwrap();

        let evaluator = Evaluator::new();
        let intent = evaluator
            .evaluate_metric(&store, EvaluateIntent { client_id, metric_instance_id: instance.id })
            .await
            .unwrap();
        assert!(intent.is_none());
    }

    #[tokio::test]
    async fn http_outcome_failure_opens_and_recovery_resolves() {
        let store = InMemoryStore::new();
        let evaluator = Evaluator::new();
        let client_id = ClientId::new();
        let http_target_id = crate::types::HttpTargetId::new();

        let down = ProbeOutcome { client_id, http_target_id, ok: false, status: 0, latency_ms: 10 };
        let intent = evaluator.evaluate_http(&store, down).await.unwrap();
        assert!(matches!(intent, Some(IncidentIntent::Open { .. })));

        let up = ProbeOutcome { client_id, http_target_id, ok: true, status: 200, latency_ms: 5 };
        let intent = evaluator.evaluate_http(&store, up).await.unwrap();
        assert!(matches!(intent, Some(IncidentIntent::Resolve { .. })));
    }

    #[tokio::test]
    async fn http_outcome_honors_client_grace_period() {
        let store = InMemoryStore::new();
        let evaluator = Evaluator::new();
        let client_id = ClientId::new();
        let http_target_id = crate::types::HttpTargetId::new();
        let mut settings = crate::types::ClientSettings::defaults_for(client_id);
        settings.grace_period_seconds = 300;
        store.seed_settings(settings);

        let down = ProbeOutcome { client_id, http_target_id, ok: false, status: 0, latency_ms: 10 };
        let intent = evaluator.evaluate_http(&store, down).await.unwrap();
        assert!(intent.is_none(), "a 300s grace period must not open on the first failure");
    }
}
