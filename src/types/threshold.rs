//! Comparison rules that determine CRITICAL vs NORMAL for a MetricInstance.

use serde::{Deserialize, Serialize};

use super::ids::{MetricInstanceId, ThresholdId};
use super::value::MetricValue;

/// The closed set of supported comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// Greater than. Numeric only.
    Gt,
    /// Less than. Numeric only.
    Lt,
    /// Equal. Numeric, bool, or string.
    Eq,
    /// Greater than or equal. Numeric only.
    Ge,
    /// Less than or equal. Numeric only.
    Le,
    /// Not equal. Numeric, bool, or string.
    Ne,
    /// Substring containment. String only.
    Contains,
}

impl std::fmt::Display for Comparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Comparison::Gt => "gt",
            Comparison::Lt => "lt",
            Comparison::Eq => "eq",
            Comparison::Ge => "ge",
            Comparison::Le => "le",
            Comparison::Ne => "ne",
            Comparison::Contains => "contains",
        };
        write!(f, "{s}")
    }
}

/// Severity attached to a threshold, surfaced in notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational; notification-worthy but not urgent.
    Info,
    /// Warning; worth operator attention.
    Warning,
    /// Error; a real problem.
    Error,
    /// Critical; page-worthy.
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

/// A comparison rule bound to one MetricInstance. At most one per instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    /// Unique identifier.
    pub id: ThresholdId,
    /// The instance this threshold gates.
    pub metric_instance_id: MetricInstanceId,
    /// The comparison operator.
    pub comparison: Comparison,
    /// The value to compare against, typed to match the metric's definition.
    pub value: MetricValue,
    /// Severity carried into notifications when this threshold trips.
    pub severity: Severity,
}

impl Threshold {
    /// Construct a new threshold.
    pub fn new(
        metric_instance_id: MetricInstanceId,
        comparison: Comparison,
        value: MetricValue,
        severity: Severity,
    ) -> Self {
        Self {
            id: ThresholdId::new(),
            metric_instance_id,
            comparison,
            value,
            severity,
        }
    }
}
