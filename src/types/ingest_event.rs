//! Idempotency markers for ingest batches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ids::{ClientId, MachineId};

/// A record that one client-supplied ingest id has been processed.
///
/// Uniqueness: (client_id, ingest_id). A conflicting insert means the
/// submission is a duplicate and must be acknowledged without side effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestEvent {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning tenant.
    pub client_id: ClientId,
    /// Client-supplied idempotency key (the `X-Ingest-Id` header value).
    pub ingest_id: Uuid,
    /// The machine the batch was attributed to.
    pub machine_id: MachineId,
    /// Server-assigned receive time.
    pub received_at: DateTime<Utc>,
    /// Agent-reported send time.
    pub sent_at: DateTime<Utc>,
}

impl IngestEvent {
    /// Construct a new ingest event record.
    pub fn new(client_id: ClientId, ingest_id: Uuid, machine_id: MachineId, sent_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_id,
            ingest_id,
            machine_id,
            received_at: Utc::now(),
            sent_at,
        }
    }
}
