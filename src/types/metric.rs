//! Metric schemas and their per-machine bindings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ClientId, MachineId, MetricDefinitionId, MetricInstanceId};
use super::value::{MetricValue, ValueKind};

/// A per-client named metric schema. Created on first appearance;
/// its value kind is immutable thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDefinition {
    /// Unique identifier.
    pub id: MetricDefinitionId,
    /// Owning tenant.
    pub client_id: ClientId,
    /// Metric name, unique per client.
    pub name: String,
    /// The fixed value kind for this metric.
    pub value_type: ValueKind,
    /// Optional display unit (e.g. "%", "ms").
    pub unit: Option<String>,
    /// Whether this definition was auto-suggested rather than operator-declared.
    pub suggested: bool,
}

impl MetricDefinition {
    /// Construct a new definition pinned to the kind of the first observed value.
    pub fn new(client_id: ClientId, name: impl Into<String>, value_type: ValueKind) -> Self {
        Self {
            id: MetricDefinitionId::new(),
            client_id,
            name: name.into(),
            value_type,
            unit: None,
            suggested: true,
        }
    }

    /// Whether a value matches this definition's pinned kind.
    pub fn accepts(&self, value: &MetricValue) -> bool {
        value.kind() == self.value_type
    }
}

/// The evaluated alert state of a MetricInstance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    /// No threshold configured, or alerting suppressed.
    Unknown,
    /// Most recent evaluation was within bounds.
    Normal,
    /// Most recent evaluation tripped the threshold.
    Critical,
}

impl std::fmt::Display for InstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InstanceState::Unknown => "UNKNOWN",
            InstanceState::Normal => "NORMAL",
            InstanceState::Critical => "CRITICAL",
        };
        write!(f, "{s}")
    }
}

/// Binding of a MetricDefinition to a Machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricInstance {
    /// Unique identifier.
    pub id: MetricInstanceId,
    /// The machine this instance belongs to.
    pub machine_id: MachineId,
    /// The schema this instance is a binding of.
    pub definition_id: MetricDefinitionId,
    /// Whether alerting is enabled for this instance.
    pub alert_enabled: bool,
    /// Operator-suppressed evaluation, distinct from alert_enabled.
    pub paused: bool,
    /// Most recently ingested value.
    pub last_value: Option<MetricValue>,
    /// Timestamp of the most recently ingested value.
    pub last_value_at: Option<DateTime<Utc>>,
    /// Current evaluated alert state. Mutated solely by the evaluator.
    pub state: InstanceState,
}

impl MetricInstance {
    /// Construct a new instance binding, created on first occurrence.
    pub fn new(machine_id: MachineId, definition_id: MetricDefinitionId) -> Self {
        Self {
            id: MetricInstanceId::new(),
            machine_id,
            definition_id,
            alert_enabled: true,
            paused: false,
            last_value: None,
            last_value_at: None,
            state: InstanceState::Unknown,
        }
    }

    /// Record a freshly ingested sample value.
    pub fn record_value(&mut self, value: MetricValue, at: DateTime<Utc>) {
        self.last_value = Some(value);
        self.last_value_at = Some(at);
    }

    /// Whether evaluation is currently suppressed by operator action.
    pub fn is_suppressed(&self) -> bool {
        self.paused || !self.alert_enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_rejects_type_drift() {
        let def = MetricDefinition::new(ClientId::new(), "cpu_load", ValueKind::Number);
        assert!(def.accepts(&MetricValue::Number { n: 0.5 }));
        assert!(!def.accepts(&MetricValue::Bool { b: true }));
    }

    #[test]
    fn suppressed_when_paused_or_alerting_disabled() {
        let mut instance = MetricInstance::new(MachineId::new(), MetricDefinitionId::new());
        assert!(!instance.is_suppressed());
        instance.paused = true;
        assert!(instance.is_suppressed());
        instance.paused = false;
        instance.alert_enabled = false;
        assert!(instance.is_suppressed());
    }
}
