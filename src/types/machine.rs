//! Monitored hosts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ClientId, MachineId};

/// A monitored host, uniquely identified within a client by `fingerprint`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    /// Unique identifier.
    pub id: MachineId,
    /// Owning tenant.
    pub client_id: ClientId,
    /// Reported hostname. Updated opportunistically on ingest.
    pub hostname: String,
    /// Reported operating system. Updated opportunistically on ingest.
    pub os: String,
    /// Stable agent-generated fingerprint. Unique per client.
    pub fingerprint: String,
    /// Whether the machine is actively monitored.
    pub is_active: bool,
    /// When the machine first appeared.
    pub registered_at: DateTime<Utc>,
    /// When the machine last reported a batch.
    pub last_seen: DateTime<Utc>,
}

impl Machine {
    /// Construct a newly registered machine.
    pub fn register(client_id: ClientId, hostname: String, os: String, fingerprint: String) -> Self {
        let now = Utc::now();
        Self {
            id: MachineId::new(),
            client_id,
            hostname,
            os,
            fingerprint,
            is_active: true,
            registered_at: now,
            last_seen: now,
        }
    }

    /// Record a new ingest observation: refresh last_seen and opportunistically
    /// update hostname/os if the agent reports new values.
    pub fn observe(&mut self, hostname: &str, os: &str, seen_at: DateTime<Utc>) {
        if seen_at > self.last_seen {
            self.last_seen = seen_at;
        }
        if !hostname.is_empty() {
            self.hostname = hostname.to_string();
        }
        if !os.is_empty() {
            self.os = os.to_string();
        }
    }

    /// Whether this machine has exceeded the heartbeat threshold.
    pub fn is_overdue(&self, now: DateTime<Utc>, threshold_minutes: i64) -> bool {
        let threshold = chrono::Duration::minutes(threshold_minutes);
        now - self.last_seen >= threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observe_updates_last_seen_monotonically() {
        let mut machine = Machine::register(
            ClientId::new(),
            "host-a".into(),
            "linux".into(),
            "fp-1".into(),
        );
        let first_seen = machine.last_seen;
        let later = first_seen + chrono::Duration::seconds(30);
        machine.observe("host-a", "linux", later);
        assert_eq!(machine.last_seen, later);

        // An out-of-order (older) observation does not move last_seen backwards.
        machine.observe("host-a", "linux", first_seen);
        assert_eq!(machine.last_seen, later);
    }

    #[test]
    fn overdue_uses_heartbeat_threshold() {
        let mut machine = Machine::register(
            ClientId::new(),
            "host-a".into(),
            "linux".into(),
            "fp-1".into(),
        );
        machine.last_seen = Utc::now() - chrono::Duration::minutes(10);
        assert!(machine.is_overdue(Utc::now(), 5));
        assert!(!machine.is_overdue(Utc::now(), 15));
    }
}
