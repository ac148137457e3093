//! Grace period and consecutive-failures gating for incident opening.
//!
//! Pure state machine, store-free: the evaluator feeds it verdicts and it
//! decides whether an open intent should actually fire. Grace and
//! consecutive-count gates may be combined; the stricter outcome wins
//! (both must be satisfied before opening).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::policy::scoring::Verdict;

/// Per-client gating configuration for incident opening.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GracePolicy {
    /// Seconds a CRITICAL verdict must persist before opening fires.
    /// Zero opens immediately (subject to the consecutive-count gate, if any).
    pub grace_period_seconds: u64,
    /// Consecutive CRITICAL verdicts required before opening fires, if set.
    pub consecutive_failures_threshold: Option<u32>,
}

impl GracePolicy {
    /// No gating: open immediately on the first CRITICAL.
    pub fn immediate() -> Self {
        Self {
            grace_period_seconds: 0,
            consecutive_failures_threshold: None,
        }
    }
}

/// Per-subject gating state, persisted across evaluations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct PendingState {
    /// When the current unbroken run of CRITICAL verdicts began.
    pub since: Option<DateTime<Utc>>,
    /// Length of the current unbroken run of CRITICAL verdicts.
    pub consecutive: u32,
}

/// What the gate decided to do with a verdict, after applying grace and
/// consecutive-count gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// Verdict was NORMAL or UNKNOWN; any pending run is cleared.
    Clear,
    /// Verdict was CRITICAL but has not yet satisfied the gate; do not open.
    Pending,
    /// Verdict was CRITICAL and the gate is satisfied; open now.
    Open,
}

impl PendingState {
    /// Feed a new verdict through the gate, mutating pending state in place
    /// and returning the resulting outcome.
    pub fn advance(&mut self, verdict: Verdict, policy: &GracePolicy, now: DateTime<Utc>) -> GateOutcome {
        if verdict != Verdict::Critical {
            self.since = None;
            self.consecutive = 0;
            return GateOutcome::Clear;
        }

        if self.since.is_none() {
            self.since = Some(now);
            self.consecutive = 0;
        }
        self.consecutive += 1;

        let grace_satisfied = match self.since {
            Some(since) => {
                (now - since).num_seconds() as u64 >= policy.grace_period_seconds
            }
            None => true,
        };
        let consecutive_satisfied = match policy.consecutive_failures_threshold {
            Some(threshold) => self.consecutive >= threshold,
            None => true,
        };

        if grace_satisfied && consecutive_satisfied {
            GateOutcome::Open
        } else {
            GateOutcome::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_grace_opens_on_first_critical() {
        let policy = GracePolicy::immediate();
        let mut state = PendingState::default();
        let now = Utc::now();
        assert_eq!(state.advance(Verdict::Critical, &policy, now), GateOutcome::Open);
    }

    #[test]
    fn grace_period_delays_open_until_elapsed() {
        let policy = GracePolicy {
            grace_period_seconds: 60,
            consecutive_failures_threshold: None,
        };
        let mut state = PendingState::default();
        let t0 = Utc::now();

        assert_eq!(state.advance(Verdict::Critical, &policy, t0), GateOutcome::Pending);
        assert_eq!(
            state.advance(Verdict::Critical, &policy, t0 + chrono::Duration::seconds(30)),
            GateOutcome::Pending
        );
        assert_eq!(
            state.advance(Verdict::Critical, &policy, t0 + chrono::Duration::seconds(61)),
            GateOutcome::Open
        );
    }

    #[test]
    fn intervening_normal_clears_pending() {
        let policy = GracePolicy {
            grace_period_seconds: 60,
            consecutive_failures_threshold: None,
        };
        let mut state = PendingState::default();
        let t0 = Utc::now();

        state.advance(Verdict::Critical, &policy, t0);
        assert_eq!(state.advance(Verdict::Normal, &policy, t0 + chrono::Duration::seconds(10)), GateOutcome::Clear);
        assert_eq!(
            state.advance(Verdict::Critical, &policy, t0 + chrono::Duration::seconds(70)),
            GateOutcome::Pending,
            "clearing resets the grace window"
        );
    }

    #[test]
    fn consecutive_threshold_requires_n_in_a_row() {
        let policy = GracePolicy {
            grace_period_seconds: 0,
            consecutive_failures_threshold: Some(3),
        };
        let mut state = PendingState::default();
        let now = Utc::now();

        assert_eq!(state.advance(Verdict::Critical, &policy, now), GateOutcome::Pending);
        assert_eq!(state.advance(Verdict::Critical, &policy, now), GateOutcome::Pending);
        assert_eq!(state.advance(Verdict::Critical, &policy, now), GateOutcome::Open);
    }

    #[test]
    fn combined_gates_require_both() {
        let policy = GracePolicy {
            grace_period_seconds: 60,
            consecutive_failures_threshold: Some(2),
        };
        let mut state = PendingState::default();
        let t0 = Utc::now();

        // Two consecutive but grace not elapsed: still pending.
        assert_eq!(state.advance(Verdict::Critical, &policy, t0), GateOutcome::Pending);
        assert_eq!(
            state.advance(Verdict::Critical, &policy, t0 + chrono::Duration::seconds(5)),
            GateOutcome::Pending
        );
        assert_eq!(
            state.advance(Verdict::Critical, &policy, t0 + chrono::Duration::seconds(65)),
            GateOutcome::Open
        );
    }
}
