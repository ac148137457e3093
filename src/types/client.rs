//! Tenant root and agent credentials.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ApiKeyId, ClientId, MachineId};

/// A tenant. Isolation boundary for all other entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    /// Unique identifier.
    pub id: ClientId,
    /// Display name.
    pub name: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Client {
    /// Construct a new client with a fresh id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ClientId::new(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

/// An opaque bearer credential used by ingest agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKey {
    /// Unique identifier.
    pub id: ApiKeyId,
    /// Owning tenant.
    pub client_id: ClientId,
    /// The bearer secret itself. Unique across all clients.
    pub key: String,
    /// Human-readable label.
    pub name: String,
    /// Whether the key currently authenticates requests.
    pub is_active: bool,
    /// Optional binding restricting this key to one machine.
    pub machine_id: Option<MachineId>,
    /// Last time this key was used to authenticate a request.
    pub last_used_at: Option<DateTime<Utc>>,
}

impl ApiKey {
    /// Whether this key currently grants access.
    pub fn is_usable(&self) -> bool {
        self.is_active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_key_is_not_usable() {
        let mut key = ApiKey {
            id: ApiKeyId::new(),
            client_id: ClientId::new(),
            key: "k".into(),
            name: "agent-1".into(),
            is_active: true,
            machine_id: None,
            last_used_at: None,
        };
        assert!(key.is_usable());
        key.is_active = false;
        assert!(!key.is_usable());
    }
}
