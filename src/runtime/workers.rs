//! Worker pools draining the bounded queues. Each pool is N tasks sharing
//! one receiver behind a mutex, so work is load-balanced across workers
//! without a separate dispatcher task.

use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};

use crate::evaluator::{Evaluator, IncidentIntent};
use crate::ingest::EvaluateIntent;
use crate::notifier::{NotifyIntent, Notifier};
use crate::incidents;
use crate::store::Store;

type Shared<T> = Arc<Mutex<mpsc::Receiver<T>>>;

/// Drain `evaluate_rx`, calling the evaluator and forwarding any resulting
/// incident intent onto `incident_tx`.
pub fn spawn_evaluate_pool(
    pool_size: usize,
    rx: mpsc::Receiver<EvaluateIntent>,
    incident_tx: mpsc::Sender<IncidentIntent>,
    store: Arc<dyn Store>,
    evaluator: Arc<Evaluator>,
    mut shutdown: watch::Receiver<bool>,
) -> Vec<tokio::task::JoinHandle<()>> {
    let rx: Shared<EvaluateIntent> = Arc::new(Mutex::new(rx));
    (0..pool_size.max(1))
        .map(|_| {
            let rx = Arc::clone(&rx);
            let incident_tx = incident_tx.clone();
            let store = Arc::clone(&store);
            let evaluator = Arc::clone(&evaluator);
            let mut shutdown = shutdown.clone();
            tokio::spawn(async move {
                loop {
                    let intent = tokio::select! {
                        biased;
                        _ = shutdown.changed() => break,
                        intent = async { rx.lock().await.recv().await } => intent,
                    };
                    let Some(intent) = intent else { break };
                    match evaluator.evaluate_metric(store.as_ref(), intent).await {
                        Ok(Some(incident_intent)) => {
                            if incident_tx.send(incident_intent).await.is_err() {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(err) => tracing::warn!(error = %err, "evaluation failed"),
                    }
                }
            })
        })
        .collect()
}

/// Drain `incident_rx`, applying each intent to the store and forwarding
/// the resulting notify intent onto `notify_tx`.
pub fn spawn_incident_pool(
    pool_size: usize,
    rx: mpsc::Receiver<IncidentIntent>,
    notify_tx: mpsc::Sender<NotifyIntent>,
    store: Arc<dyn Store>,
    mut shutdown: watch::Receiver<bool>,
) -> Vec<tokio::task::JoinHandle<()>> {
    let rx: Shared<IncidentIntent> = Arc::new(Mutex::new(rx));
    (0..pool_size.max(1))
        .map(|_| {
            let rx = Arc::clone(&rx);
            let notify_tx = notify_tx.clone();
            let store = Arc::clone(&store);
            let mut shutdown = shutdown.clone();
            tokio::spawn(async move {
                loop {
                    let intent = tokio::select! {
                        biased;
                        _ = shutdown.changed() => break,
                        intent = async { rx.lock().await.recv().await } => intent,
                    };
                    let Some(intent) = intent else { break };
                    match incidents::apply(store.as_ref(), intent).await {
                        Ok(Some(notify_intent)) => {
                            if notify_tx.send(notify_intent).await.is_err() {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(err) => tracing::warn!(error = %err, "incident transition failed"),
                    }
                }
            })
        })
        .collect()
}

/// Drain `notify_rx`, dispatching each intent through the notifier.
pub fn spawn_notify_pool(
    pool_size: usize,
    rx: mpsc::Receiver<NotifyIntent>,
    store: Arc<dyn Store>,
    notifier: Arc<Notifier>,
    mut shutdown: watch::Receiver<bool>,
) -> Vec<tokio::task::JoinHandle<()>> {
    let rx: Shared<NotifyIntent> = Arc::new(Mutex::new(rx));
    (0..pool_size.max(1))
        .map(|_| {
            let rx = Arc::clone(&rx);
            let store = Arc::clone(&store);
            let notifier = Arc::clone(&notifier);
            let mut shutdown = shutdown.clone();
            tokio::spawn(async move {
                loop {
                    let intent: Option<NotifyIntent> = tokio::select! {
                        biased;
                        _ = shutdown.changed() => break,
                        intent = async { rx.lock().await.recv().await } => intent,
                    };
                    let Some(intent) = intent else { break };
                    if let Err(err) = notifier.dispatch(store.as_ref(), intent).await {
                        tracing::warn!(error = %err, "notification dispatch failed");
                    }
                }
            })
        })
        .collect()
}
