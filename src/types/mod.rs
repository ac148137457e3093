//! Core data model: clients, machines, metrics, thresholds, incidents,
//! notifications, and the per-client settings that govern them.

pub mod client;
pub mod http_target;
pub mod ids;
pub mod incident;
pub mod ingest_event;
pub mod machine;
pub mod metric;
pub mod notification;
pub mod sample;
pub mod settings;
pub mod threshold;
pub mod value;

pub use client::{ApiKey, Client};
pub use http_target::{HttpMethod, HttpTarget};
pub use ids::{
    ApiKeyId, ClientId, HttpTargetId, IncidentId, MachineId, MetricDefinitionId,
    MetricInstanceId, NotificationId, SampleId, ThresholdId,
};
pub use incident::{Incident, IncidentStatus, Subject};
pub use ingest_event::IngestEvent;
pub use machine::Machine;
pub use metric::{InstanceState, MetricDefinition, MetricInstance};
pub use notification::{NotificationKind, NotificationLog, NotificationStatus, Provider};
pub use sample::Sample;
pub use settings::ClientSettings;
pub use threshold::{Comparison, Severity, Threshold};
pub use value::{MetricValue, ValueKind};
