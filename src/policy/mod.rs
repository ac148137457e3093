//! Pure, store-free evaluation policy: comparison dispatch and the
//! grace-period / consecutive-failures gate consumed by the evaluator.

pub mod grace;
pub mod scoring;

pub use grace::{GateOutcome, GracePolicy, PendingState};
pub use scoring::{evaluate, Verdict};
