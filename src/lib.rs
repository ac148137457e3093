//! # sentinel-monitor
//!
//! Multi-tenant monitoring backend.
//!
//! Agents running on client machines push metric batches; the service also
//! probes client-registered HTTP endpoints on its own schedule. Every
//! observation is evaluated against a threshold (metrics) or a simple
//! up/down check (HTTP), gated by a grace period and consecutive-failure
//! count, and drives an incident lifecycle that a notifier dispatches to
//! Slack and/or email with cooldown-governed reminders.
//!
//! ## Architecture
//!
//! ```text
//! Agent push / HTTP probe → Evaluator → IncidentIntent → Incident Manager → NotifyIntent → Notifier
//!                                ↑                              ↓
//!                          policy::{scoring,grace}          Store (Postgres or Memory)
//! ```
//!
//! ## Determinism guarantees
//!
//! - [`policy::scoring::evaluate`] is a pure function: same threshold + same
//!   value always produces the same verdict.
//! - At most one OPEN incident exists per subject, enforced by the store's
//!   partial unique index, never by application-level locking.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod types;
pub mod canonical;
pub mod policy;
pub mod store;
pub mod ingest;
pub mod prober;
pub mod evaluator;
pub mod incidents;
pub mod providers;
pub mod notifier;
pub mod runtime;
pub mod service;

pub use config::Config;
pub use error::{AppError, StoreError};
pub use evaluator::{Evaluator, IncidentIntent};
pub use ingest::{ingest, IngestAck, IngestBatch};
pub use notifier::{NotifyIntent, Notifier};
pub use prober::{ProbeOutcome, Prober};
pub use store::{OpenOutcome, Store};
pub use service::{build_router, AppState};

/// Schema version for the persisted data model. Increment on breaking
/// changes to any table shape the store backends depend on.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Default reminder cooldown, in minutes, used when neither a client
/// override nor a process `DEFAULT_ALERT_REMINDER_MINUTES` is set.
pub const DEFAULT_ALERT_REMINDER_MINUTES: u64 = 30;
