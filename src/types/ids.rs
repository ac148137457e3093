//! Newtype identifiers for every addressable entity.
//!
//! Each id wraps a `Uuid` and is distinct at the type level so a
//! `MachineId` can never be passed where a `ClientId` is expected.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new random id.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing uuid.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Borrow the underlying uuid.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::from_str(s)?))
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

uuid_id!(ClientId, "Tenant root identifier.");
uuid_id!(ApiKeyId, "Identifier of an issued api key.");
uuid_id!(MachineId, "Identifier of a monitored host.");
uuid_id!(MetricDefinitionId, "Identifier of a per-client metric schema.");
uuid_id!(MetricInstanceId, "Identifier of a (definition, machine) binding.");
uuid_id!(SampleId, "Identifier of an appended sample.");
uuid_id!(ThresholdId, "Identifier of a comparison rule.");
uuid_id!(HttpTargetId, "Identifier of a probed HTTP target.");
uuid_id!(IncidentId, "Identifier of an incident record.");
uuid_id!(NotificationId, "Identifier of a notification log row.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse_round_trip() {
        let id = ClientId::new();
        let text = id.to_string();
        let parsed: ClientId = text.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn distinct_id_types_do_not_compare() {
        let client = ClientId::new();
        let machine = MachineId::from_uuid(*client.as_uuid());
        // Same underlying uuid, different types - this just demonstrates
        // that the types are independent newtypes, not that they are equal.
        assert_eq!(client.as_uuid(), machine.as_uuid());
    }
}
