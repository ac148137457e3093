//! Pure comparison dispatch for the threshold evaluator.
//!
//! These functions take no store, no clock, and perform no I/O - they are
//! the hot path benchmarked in `benches/evaluation.rs` and exhaustively
//! exercised by `proptest` for NaN and type-drift behavior.

use crate::types::{Comparison, MetricValue, Threshold};

/// Outcome of comparing one sample value against a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The comparison held - state is NORMAL.
    Normal,
    /// The comparison tripped - state is CRITICAL.
    Critical,
    /// The comparison could not be evaluated (NaN, missing threshold,
    /// or an operator unsupported for the value's kind) - state is UNKNOWN.
    Unknown,
}

/// Evaluate a sample value against a threshold, returning a verdict.
///
/// Numeric comparisons on NaN always yield `Unknown`. An operator applied
/// to a value kind it does not support (e.g. `gt` on a string) also
/// yields `Unknown` rather than panicking - type drift is rejected at
/// ingest (`MetricDefinition::accepts`), so this is a defense-in-depth
/// fallback, not the primary guard.
pub fn evaluate(threshold: &Threshold, value: &MetricValue) -> Verdict {
    match (threshold.comparison, value, &threshold.value) {
        (Comparison::Gt, MetricValue::Number { n: v }, MetricValue::Number { n: t }) => {
            numeric_verdict(*v, *t, |v, t| v > t)
        }
        (Comparison::Lt, MetricValue::Number { n: v }, MetricValue::Number { n: t }) => {
            numeric_verdict(*v, *t, |v, t| v < t)
        }
        (Comparison::Ge, MetricValue::Number { n: v }, MetricValue::Number { n: t }) => {
            numeric_verdict(*v, *t, |v, t| v >= t)
        }
        (Comparison::Le, MetricValue::Number { n: v }, MetricValue::Number { n: t }) => {
            numeric_verdict(*v, *t, |v, t| v <= t)
        }
        (Comparison::Eq, MetricValue::Number { n: v }, MetricValue::Number { n: t }) => {
            numeric_verdict(*v, *t, |v, t| v == t)
        }
        (Comparison::Ne, MetricValue::Number { n: v }, MetricValue::Number { n: t }) => {
            numeric_verdict(*v, *t, |v, t| v != t)
        }
        (Comparison::Eq, MetricValue::Bool { b: v }, MetricValue::Bool { b: t }) => {
            critical_if(v == t)
        }
        (Comparison::Ne, MetricValue::Bool { b: v }, MetricValue::Bool { b: t }) => {
            critical_if(v != t)
        }
        (Comparison::Eq, MetricValue::String { s: v }, MetricValue::String { s: t }) => {
            critical_if(v == t)
        }
        (Comparison::Ne, MetricValue::String { s: v }, MetricValue::String { s: t }) => {
            critical_if(v != t)
        }
        (Comparison::Contains, MetricValue::String { s: v }, MetricValue::String { s: t }) => {
            critical_if(v.contains(t.as_str()))
        }
        _ => Verdict::Unknown,
    }
}

fn numeric_verdict(value: f64, threshold: f64, critical: impl Fn(f64, f64) -> bool) -> Verdict {
    if value.is_nan() || threshold.is_nan() {
        return Verdict::Unknown;
    }
    critical_if(critical(value, threshold))
}

fn critical_if(tripped: bool) -> Verdict {
    if tripped {
        Verdict::Critical
    } else {
        Verdict::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MetricInstanceId, Severity};

    fn threshold(comparison: Comparison, value: MetricValue) -> Threshold {
        Threshold::new(MetricInstanceId::new(), comparison, value, Severity::Critical)
    }

    #[test]
    fn gt_trips_above_threshold() {
        let t = threshold(Comparison::Gt, MetricValue::Number { n: 0.8 });
        assert_eq!(evaluate(&t, &MetricValue::Number { n: 0.9 }), Verdict::Critical);
        assert_eq!(evaluate(&t, &MetricValue::Number { n: 0.5 }), Verdict::Normal);
    }

    #[test]
    fn nan_sample_is_unknown_never_critical() {
        let t = threshold(Comparison::Gt, MetricValue::Number { n: 0.8 });
        assert_eq!(evaluate(&t, &MetricValue::Number { n: f64::NAN }), Verdict::Unknown);
    }

    #[test]
    fn nan_threshold_is_unknown() {
        let t = threshold(Comparison::Gt, MetricValue::Number { n: f64::NAN });
        assert_eq!(evaluate(&t, &MetricValue::Number { n: 1.0 }), Verdict::Unknown);
    }

    #[test]
    fn bool_equality() {
        let t = threshold(Comparison::Eq, MetricValue::Bool { b: true });
        assert_eq!(evaluate(&t, &MetricValue::Bool { b: true }), Verdict::Critical);
        assert_eq!(evaluate(&t, &MetricValue::Bool { b: false }), Verdict::Normal);
    }

    #[test]
    fn string_contains() {
        let t = threshold(Comparison::Contains, MetricValue::String { s: "error".into() });
        assert_eq!(
            evaluate(&t, &MetricValue::String { s: "fatal error seen".into() }),
            Verdict::Critical
        );
        assert_eq!(
            evaluate(&t, &MetricValue::String { s: "all good".into() }),
            Verdict::Normal
        );
    }

    #[test]
    fn mismatched_kinds_are_unknown_not_panicking() {
        let t = threshold(Comparison::Gt, MetricValue::Number { n: 0.8 });
        assert_eq!(evaluate(&t, &MetricValue::String { s: "x".into() }), Verdict::Unknown);
    }

    proptest::proptest! {
        #[test]
        fn numeric_comparisons_never_panic(v in proptest::num::f64::ANY, t in proptest::num::f64::ANY) {
            let threshold = threshold(Comparison::Gt, MetricValue::Number { n: t });
            let verdict = evaluate(&threshold, &MetricValue::Number { n: v });
            if v.is_nan() || t.is_nan() {
                proptest::prop_assert_eq!(verdict, Verdict::Unknown);
            }
        }
    }
}
