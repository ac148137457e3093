//! End-to-end coverage of the ingest -> evaluate -> incident path against
//! the in-memory store, with no database required.

use chrono::Utc;
use uuid::Uuid;

use sentinel_monitor::evaluator::{Evaluator, IncidentIntent};
use sentinel_monitor::ingest::{ingest, IngestBatch, IngestMachine, IngestMetric};
use sentinel_monitor::incidents;
use sentinel_monitor::store::{InMemoryStore, Store};
use sentinel_monitor::types::{ClientId, Comparison, MetricValue, Severity, Threshold, ValueKind};

fn batch(cpu: f64) -> IngestBatch {
    IngestBatch {
        sent_at: Utc::now(),
        machine: IngestMachine {
            hostname: "web-1".into(),
            os: "linux".into(),
            fingerprint: "agent-fingerprint-1".into(),
        },
        metrics: vec![IngestMetric {
            name: "cpu_percent".into(),
            value_type: ValueKind::Number,
            value: MetricValue::Number { n: cpu },
            unit: Some("percent".into()),
        }],
    }
}

#[tokio::test]
async fn first_batch_registers_machine_and_instance_with_no_threshold_yet() {
    let store = InMemoryStore::new();
    let client_id = ClientId::new();

    let (ack, intents, _machine_id) = ingest(&store, client_id, None, batch(42.0)).await.unwrap();
    assert!(ack.accepted);
    assert!(!ack.duplicate);
    assert_eq!(intents.len(), 1);

    let instance = store.get_instance(intents[0].metric_instance_id).await.unwrap().unwrap();
    assert_eq!(instance.last_value, Some(MetricValue::Number { n: 42.0 }));
}

#[tokio::test]
async fn duplicate_ingest_id_is_a_no_op_second_time() {
    let store = InMemoryStore::new();
    let client_id = ClientId::new();
    let ingest_id = Uuid::new_v4();

    let (first, first_intents, _) = ingest(&store, client_id, Some(ingest_id), batch(10.0)).await.unwrap();
    assert!(!first.duplicate);
    assert_eq!(first_intents.len(), 1);

    let (second, second_intents, _) = ingest(&store, client_id, Some(ingest_id), batch(99.0)).await.unwrap();
    assert!(second.duplicate);
    assert!(second_intents.is_empty());

    // The second (duplicate) submission's value never lands.
    let instance = store.get_instance(first_intents[0].metric_instance_id).await.unwrap().unwrap();
    assert_eq!(instance.last_value, Some(MetricValue::Number { n: 10.0 }));
}

#[tokio::test]
async fn type_drift_on_a_known_metric_is_rejected() {
    let store = InMemoryStore::new();
    let client_id = ClientId::new();
    ingest(&store, client_id, None, batch(10.0)).await.unwrap();

    let mut drifted = batch(0.0);
    drifted.metrics[0].value_type = ValueKind::String;
    drifted.metrics[0].value = MetricValue::String { s: "not a number".into() };

    let err = ingest(&store, client_id, None, drifted).await.unwrap_err();
    assert!(matches!(err, sentinel_monitor::error::AppError::Validation(_)));
}

#[tokio::test]
async fn breach_opens_an_incident_and_recovery_resolves_it() {
    let store = InMemoryStore::new();
    let client_id = ClientId::new();
    let evaluator = Evaluator::new();

    let (_, intents, _) = ingest(&store, client_id, None, batch(10.0)).await.unwrap();
    let metric_instance_id = intents[0].metric_instance_id;
    store.seed_threshold(Threshold::new(
        metric_instance_id,
        Comparison::Gt,
        MetricValue::Number { n: 90.0 },
        Severity::Critical,
    ));

    // Below threshold: no incident.
    let none_intent = evaluator.evaluate_metric(&store, intents[0]).await.unwrap();
    assert!(none_intent.is_none());

    // Breach.
    let (_, breach_intents, _) = ingest(&store, client_id, None, batch(95.0)).await.unwrap();
    let open_intent = evaluator.evaluate_metric(&store, breach_intents[0]).await.unwrap();
    let open_intent = open_intent.expect("a breach with zero grace period opens immediately");
    assert!(matches!(open_intent, IncidentIntent::Open { severity: Severity::Critical, .. }));

    let notify = incidents::apply(&store, open_intent).await.unwrap();
    assert!(notify.is_some());

    let open_incidents = store.list_incidents(client_id, true).await.unwrap();
    assert_eq!(open_incidents.len(), 1);

    // Recovery.
    let (_, recover_intents, _) = ingest(&store, client_id, None, batch(5.0)).await.unwrap();
    let resolve_intent = evaluator.evaluate_metric(&store, recover_intents[0]).await.unwrap();
    let resolve_intent = resolve_intent.expect("a drop back below threshold resolves the incident");
    assert!(matches!(resolve_intent, IncidentIntent::Resolve { .. }));

    incidents::apply(&store, resolve_intent).await.unwrap();
    let open_incidents = store.list_incidents(client_id, true).await.unwrap();
    assert!(open_incidents.is_empty());
}
