//! Ingest pipeline: authenticate, resolve machine/definitions/instances,
//! append samples, and emit evaluate intents for whatever changed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::store::Store;
use crate::types::{
    ApiKey, ClientId, Machine, MachineId, MetricDefinition, MetricInstance, MetricInstanceId,
    MetricValue, Sample, ValueKind,
};

/// One metric observation in an ingest batch.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestMetric {
    /// The metric's name, scoped to the client.
    pub name: String,
    /// Declared value kind, used only to validate `value`'s shape.
    #[serde(rename = "type")]
    pub value_type: ValueKind,
    /// The observed value.
    pub value: MetricValue,
    /// Optional display unit, recorded on first definition creation.
    pub unit: Option<String>,
}

/// Machine identity reported in an ingest batch.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestMachine {
    /// Reported hostname.
    pub hostname: String,
    /// Reported operating system.
    pub os: String,
    /// Stable agent-generated fingerprint.
    pub fingerprint: String,
}

/// The body of `POST /ingest/metrics`.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestBatch {
    /// Agent-reported send time, retained for skew diagnostics.
    pub sent_at: DateTime<Utc>,
    /// Machine identity for this batch.
    pub machine: IngestMachine,
    /// The observed metrics.
    pub metrics: Vec<IngestMetric>,
}

/// Response body for a successful ingest.
#[derive(Debug, Clone, Serialize)]
pub struct IngestAck {
    /// Always true; failures are returned as errors, not this body.
    pub accepted: bool,
    /// Whether this submission was a duplicate of an already-seen ingest id.
    pub duplicate: bool,
}

/// An instance whose newest sample needs evaluation.
#[derive(Debug, Clone, Copy)]
pub struct EvaluateIntent {
    /// Owning tenant.
    pub client_id: ClientId,
    /// The instance to re-evaluate.
    pub metric_instance_id: MetricInstanceId,
}

/// Entries bounded to this many distinct keys regardless of TTL, so a flood
/// of bogus bearer tokens can't grow the cache without bound.
const MAX_CACHED_KEYS: usize = 10_000;

/// A short-TTL, size-bounded cache of validated api keys, avoiding a store
/// round trip on every ingest request. Invalidation on disable is eventual
/// between the TTL check here and the eager [`ApiKeyCache::invalidate`] call
/// the operator surface makes on disable.
pub struct ApiKeyCache {
    ttl: Duration,
    entries: Mutex<LruCache<String, (ApiKey, Instant)>>,
}

impl ApiKeyCache {
    /// Construct an empty cache with the given TTL.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(LruCache::new(
                std::num::NonZeroUsize::new(MAX_CACHED_KEYS).expect("MAX_CACHED_KEYS is nonzero"),
            )),
        }
    }

    fn get(&self, key: &str) -> Option<ApiKey> {
        let mut entries = self.entries.lock();
        let (api_key, inserted_at) = entries.get(key)?;
        if inserted_at.elapsed() > self.ttl {
            entries.pop(key);
            return None;
        }
        Some(api_key.clone())
    }

    fn put(&self, key: String, api_key: ApiKey) {
        self.entries.lock().put(key, (api_key, Instant::now()));
    }

    /// Drop a key eagerly, used when a key is disabled through the operator surface.
    pub fn invalidate(&self, key: &str) {
        self.entries.lock().pop(key);
    }
}

/// Authenticate a bearer key, consulting the cache before the store.
pub async fn authenticate(
    store: &dyn Store,
    cache: &ApiKeyCache,
    raw_key: &str,
) -> Result<ApiKey, AppError> {
    if let Some(cached) = cache.get(raw_key) {
        return if cached.is_usable() {
            Ok(cached)
        } else {
            Err(AppError::Auth("api key is disabled".into()))
        };
    }

    let api_key = store
        .find_api_key(raw_key)
        .await
        .map_err(|e| AppError::Transient(e.to_string()))?
        .ok_or_else(|| AppError::Auth("unknown api key".into()))?;

    cache.put(raw_key.to_string(), api_key.clone());

    if !api_key.is_usable() {
        return Err(AppError::Auth("api key is disabled".into()));
    }
    Ok(api_key)
}

/// Process one ingest batch end to end, returning the evaluate intents it
/// produced and the machine it was attributed to (the caller uses the
/// latter to resolve any open heartbeat incident: this machine just proved
/// it is alive).
pub async fn ingest(
    store: &dyn Store,
    client_id: ClientId,
    ingest_id: Option<Uuid>,
    batch: IngestBatch,
) -> Result<(IngestAck, Vec<EvaluateIntent>, MachineId), AppError> {
    let machine = resolve_machine(store, client_id, &batch.machine, batch.sent_at).await?;

    if let Some(ingest_id) = ingest_id {
        let first_time = store
            .try_record_ingest_event(client_id, ingest_id, machine.id, batch.sent_at)
            .await
            .map_err(|e| AppError::Transient(e.to_string()))?;
        if !first_time {
            return Ok((
                IngestAck {
                    accepted: true,
                    duplicate: true,
                },
                Vec::new(),
                machine.id,
            ));
        }
    }

    // Validate every metric's type against its definition before touching
    // storage, so a mid-batch type conflict never leaves a partial write.
    for metric in &batch.metrics {
        if let Some(existing) = store
            .find_definition_by_name(client_id, &metric.name)
            .await
            .map_err(|e| AppError::Transient(e.to_string()))?
        {
            if existing.value_type != metric.value.kind() {
                return Err(AppError::Validation(format!(
                    "metric {} previously recorded as {}, got {}",
                    metric.name,
                    existing.value_type,
                    metric.value.kind()
                )));
            }
        }
    }

    let mut intents = Vec::with_capacity(batch.metrics.len());
    for metric in batch.metrics {
        let definition = resolve_definition(store, client_id, &metric).await?;
        let mut instance = resolve_instance(store, machine.id, definition.id).await?;
        let value = metric.value;
        instance.record_value(value.clone(), batch.sent_at);
        store
            .update_instance(&instance)
            .await
            .map_err(|e| AppError::Transient(e.to_string()))?;
        store
            .insert_sample(Sample::new(instance.id, batch.sent_at, value))
            .await
            .map_err(|e| AppError::Transient(e.to_string()))?;
        intents.push(EvaluateIntent {
            client_id,
            metric_instance_id: instance.id,
        });
    }

    Ok((
        IngestAck {
            accepted: true,
            duplicate: false,
        },
        intents,
        machine.id,
    ))
}

async fn resolve_machine(
    store: &dyn Store,
    client_id: ClientId,
    reported: &IngestMachine,
    observed_at: DateTime<Utc>,
) -> Result<Machine, AppError> {
    match store
        .find_machine_by_fingerprint(client_id, &reported.fingerprint)
        .await
        .map_err(|e| AppError::Transient(e.to_string()))?
    {
        Some(mut machine) => {
            machine.observe(&reported.hostname, &reported.os, observed_at);
            store
                .update_machine(&machine)
                .await
                .map_err(|e| AppError::Transient(e.to_string()))?;
            Ok(machine)
        }
        None => {
            let machine = Machine::register(
                client_id,
                reported.hostname.clone(),
                reported.os.clone(),
                reported.fingerprint.clone(),
            );
            store
                .insert_machine(machine.clone())
                .await
                .map_err(|e| AppError::Transient(e.to_string()))?;
            Ok(machine)
        }
    }
}

async fn resolve_definition(
    store: &dyn Store,
    client_id: ClientId,
    metric: &IngestMetric,
) -> Result<MetricDefinition, AppError> {
    if let Some(existing) = store
        .find_definition_by_name(client_id, &metric.name)
        .await
        .map_err(|e| AppError::Transient(e.to_string()))?
    {
        return Ok(existing);
    }
    let mut definition = MetricDefinition::new(client_id, metric.name.clone(), metric.value.kind());
    definition.unit = metric.unit.clone();
    store
        .insert_definition(definition.clone())
        .await
        .map_err(|e| AppError::Transient(e.to_string()))?;
    Ok(definition)
}

async fn resolve_instance(
    store: &dyn Store,
    machine_id: MachineId,
    definition_id: crate::types::MetricDefinitionId,
) -> Result<MetricInstance, AppError> {
    if let Some(existing) = store
        .find_instance(machine_id, definition_id)
        .await
        .map_err(|e| AppError::Transient(e.to_string()))?
    {
        return Ok(existing);
    }
    let instance = MetricInstance::new(machine_id, definition_id);
    store
        .insert_instance(instance.clone())
        .await
        .map_err(|e| AppError::Transient(e.to_string()))?;
    Ok(instance)
}

/// A thin `Arc`-friendly wrapper used by the service layer, since `Store`
/// is commonly held as `Arc<dyn Store>`.
pub type SharedStore = Arc<dyn Store>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn batch(fingerprint: &str) -> IngestBatch {
        IngestBatch {
            sent_at: Utc::now(),
            machine: IngestMachine {
                hostname: "host-a".into(),
                os: "linux".into(),
                fingerprint: fingerprint.into(),
            },
            metrics: vec![IngestMetric {
                name: "cpu_load".into(),
                value_type: ValueKind::Number,
                value: MetricValue::Number { n: 0.5 },
                unit: Some("ratio".into()),
            }],
        }
    }

    #[tokio::test]
    async fn first_ingest_creates_machine_definition_and_instance() {
        let store = InMemoryStore::new();
        let client_id = ClientId::new();
        let (ack, intents, _machine_id) = ingest(&store, client_id, None, batch("fp-1")).await.unwrap();
        assert!(ack.accepted);
        assert!(!ack.duplicate);
        assert_eq!(intents.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_ingest_id_is_a_no_op() {
        let store = InMemoryStore::new();
        let client_id = ClientId::new();
        let ingest_id = Uuid::new_v4();

        let (first, _, _) = ingest(&store, client_id, Some(ingest_id), batch("fp-2")).await.unwrap();
        let (second, intents, _) = ingest(&store, client_id, Some(ingest_id), batch("fp-2")).await.unwrap();

        assert!(!first.duplicate);
        assert!(second.duplicate);
        assert!(intents.is_empty());
    }

    #[tokio::test]
    async fn type_drift_rejects_whole_batch() {
        let store = InMemoryStore::new();
        let client_id = ClientId::new();
        ingest(&store, client_id, None, batch("fp-3")).await.unwrap();

        let mut drifted = batch("fp-3");
        drifted.metrics[0].value = MetricValue::Bool { b: true };
        drifted.metrics[0].value_type = ValueKind::Bool;

        let err = ingest(&store, client_id, None, drifted).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
