//! Dynamically typed metric values.
//!
//! The wire format permits heterogeneous values; internally every value is
//! one variant of this tagged enum. `MetricDefinition` pins the variant
//! discriminant for a given metric name and rejects type drift.

use serde::{Deserialize, Serialize};

/// The closed set of value kinds a metric can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// Numeric measurement (stored as f64, wire may send int or float).
    Number,
    /// Boolean measurement (e.g. a health check flag).
    Bool,
    /// String measurement (e.g. a version tag).
    String,
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ValueKind::Number => "number",
            ValueKind::Bool => "bool",
            ValueKind::String => "string",
        };
        write!(f, "{s}")
    }
}

/// A single typed metric value.
///
/// Serializes as an internally tagged object: `{"kind":"number","n":0.42}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricValue {
    /// A numeric value.
    Number {
        /// The numeric payload.
        n: f64,
    },
    /// A boolean value.
    Bool {
        /// The boolean payload.
        b: bool,
    },
    /// A string value.
    String {
        /// The string payload.
        s: String,
    },
}

impl MetricValue {
    /// The kind discriminant of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            MetricValue::Number { .. } => ValueKind::Number,
            MetricValue::Bool { .. } => ValueKind::Bool,
            MetricValue::String { .. } => ValueKind::String,
        }
    }

    /// View this value as a number, if it is one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            MetricValue::Number { n } => Some(*n),
            _ => None,
        }
    }

    /// View this value as a bool, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetricValue::Bool { b } => Some(*b),
            _ => None,
        }
    }

    /// View this value as a string, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetricValue::String { s } => Some(s.as_str()),
            _ => None,
        }
    }
}

impl std::fmt::Display for MetricValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricValue::Number { n } => write!(f, "{n}"),
            MetricValue::Bool { b } => write!(f, "{b}"),
            MetricValue::String { s } => write!(f, "{s}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_round_trips_through_json() {
        let v = MetricValue::Number { n: 0.42 };
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, r#"{"kind":"number","n":0.42}"#);
        let back: MetricValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn kind_matches_variant() {
        assert_eq!(MetricValue::Bool { b: true }.kind(), ValueKind::Bool);
        assert_eq!(
            MetricValue::String { s: "x".into() }.kind(),
            ValueKind::String
        );
    }
}
