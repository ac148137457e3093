//! Bounded in-process queues connecting the pipeline stages. Each stage is
//! an independent mpsc channel with its own worker pool, so a slow notify
//! provider backs up only the notify queue, not ingestion.

use tokio::sync::mpsc;

use crate::evaluator::IncidentIntent;
use crate::ingest::EvaluateIntent;
use crate::notifier::NotifyIntent;

/// Capacity of each bounded channel. A full queue applies backpressure to
/// its producer rather than growing without bound.
const QUEUE_CAPACITY: usize = 1024;

/// The senders other components use to hand work to the runtime. Cloning
/// is cheap; every clone shares the same bounded channel.
#[derive(Clone)]
pub struct QueueHandles {
    /// Fed by the ingest route after every accepted metric batch.
    pub evaluate_tx: mpsc::Sender<EvaluateIntent>,
    /// Fed by evaluate workers and the HTTP sweep loop.
    pub incident_tx: mpsc::Sender<IncidentIntent>,
    /// Fed by the incident manager.
    pub notify_tx: mpsc::Sender<NotifyIntent>,
}

/// The receiving half of each queue, consumed exactly once by the worker
/// pool that owns that stage.
pub struct QueueReceivers {
    /// Receiver for [`QueueHandles::evaluate_tx`].
    pub evaluate_rx: mpsc::Receiver<EvaluateIntent>,
    /// Receiver for [`QueueHandles::incident_tx`].
    pub incident_rx: mpsc::Receiver<IncidentIntent>,
    /// Receiver for [`QueueHandles::notify_tx`].
    pub notify_rx: mpsc::Receiver<NotifyIntent>,
}

/// Build a fresh set of queues.
pub fn build() -> (QueueHandles, QueueReceivers) {
    let (evaluate_tx, evaluate_rx) = mpsc::channel(QUEUE_CAPACITY);
    let (incident_tx, incident_rx) = mpsc::channel(QUEUE_CAPACITY);
    let (notify_tx, notify_rx) = mpsc::channel(QUEUE_CAPACITY);
    (
        QueueHandles { evaluate_tx, incident_tx, notify_tx },
        QueueReceivers { evaluate_rx, incident_rx, notify_rx },
    )
}
