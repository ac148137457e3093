//! Append-only metric observations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{MetricInstanceId, SampleId};
use super::value::MetricValue;

/// A single appended observation for a MetricInstance.
///
/// Retention beyond recent history sufficient for evaluation and UI display
/// is not required; this is not a time-series analytics store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Unique identifier.
    pub id: SampleId,
    /// The instance this sample belongs to.
    pub metric_instance_id: MetricInstanceId,
    /// Server-assigned receive time.
    pub ts: DateTime<Utc>,
    /// Agent-reported send time, retained for skew diagnostics.
    pub sent_at: DateTime<Utc>,
    /// The observed value.
    pub value: MetricValue,
}

impl Sample {
    /// Construct a new sample received now.
    pub fn new(metric_instance_id: MetricInstanceId, sent_at: DateTime<Utc>, value: MetricValue) -> Self {
        Self {
            id: SampleId::new(),
            metric_instance_id,
            ts: Utc::now(),
            sent_at,
            value,
        }
    }
}
