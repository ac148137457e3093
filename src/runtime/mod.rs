//! The worker runtime: wires the bounded queues, their worker pools, and
//! the ticker-driven HTTP/heartbeat loops into a single handle the service
//! binary starts and shuts down.

pub mod clock;
pub mod queues;
pub mod workers;

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::config::Config;
use crate::evaluator::{Evaluator, IncidentIntent};
use crate::ingest::EvaluateIntent;
use crate::notifier::Notifier;
use crate::prober::Prober;
use crate::store::Store;

pub use queues::QueueHandles;

/// A running worker runtime. Dropping this without calling [`Runtime::shutdown`]
/// leaves the background tasks running detached; always shut down explicitly.
pub struct Runtime {
    /// Senders used by the HTTP layer to enqueue work.
    pub queues: QueueHandles,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl Runtime {
    /// Build every queue, worker pool, and ticker loop and start them.
    pub fn start(config: Arc<Config>, store: Arc<dyn Store>) -> Self {
        let (queue_handles, queue_rx) = queues::build();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let evaluator = Arc::new(Evaluator::new());
        let prober = Arc::new(Prober::new(config.http_prober_concurrency, config.http_probe_max_redirects));
        let notifier = Arc::new(Notifier::new(Arc::clone(&config)));

        let mut tasks = Vec::new();

        tasks.extend(workers::spawn_evaluate_pool(
            config.worker_pools.evaluate,
            queue_rx.evaluate_rx,
            queue_handles.incident_tx.clone(),
            Arc::clone(&store),
            Arc::clone(&evaluator),
            shutdown_rx.clone(),
        ));

        tasks.extend(workers::spawn_incident_pool(
            config.worker_pools.incident,
            queue_rx.incident_rx,
            queue_handles.notify_tx.clone(),
            Arc::clone(&store),
            shutdown_rx.clone(),
        ));

        tasks.extend(workers::spawn_notify_pool(
            config.worker_pools.notify,
            queue_rx.notify_rx,
            Arc::clone(&store),
            Arc::clone(&notifier),
            shutdown_rx.clone(),
        ));

        tasks.push(clock::spawn_http_sweep_loop(
            Arc::clone(&store),
            Arc::clone(&prober),
            Arc::clone(&evaluator),
            queue_handles.incident_tx.clone(),
            shutdown_rx.clone(),
        ));

        tasks.push(clock::spawn_heartbeat_loop(
            Arc::clone(&store),
            Arc::clone(&evaluator),
            config.default_heartbeat_threshold.as_secs() as i64 / 60,
            queue_handles.incident_tx.clone(),
            shutdown_rx.clone(),
        ));

        Self { queues: queue_handles, shutdown_tx, tasks }
    }

    /// Enqueue a freshly ingested metric for evaluation. Returns an error
    /// if the evaluate queue is closed (the runtime has shut down).
    pub async fn enqueue_evaluation(&self, intent: EvaluateIntent) -> Result<(), mpsc::error::SendError<EvaluateIntent>> {
        self.queues.evaluate_tx.send(intent).await
    }

    /// Enqueue an incident intent directly, bypassing evaluation. Used by
    /// callers that already hold a decision (none in the current routes,
    /// reserved for an operator-triggered manual re-evaluation).
    pub async fn enqueue_incident(&self, intent: IncidentIntent) -> Result<(), mpsc::error::SendError<IncidentIntent>> {
        self.queues.incident_tx.send(intent).await
    }

    /// Signal every worker and ticker loop to stop, then wait for them to
    /// drain. In-flight work already pulled off a queue runs to completion;
    /// anything still sitting in a channel buffer is dropped.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
    }
}
