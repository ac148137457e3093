//! Ticker-driven background loops: the HTTP prober sweep and the machine
//! heartbeat scan.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use crate::evaluator::{Evaluator, IncidentIntent};
use crate::prober::Prober;
use crate::store::Store;
use crate::types::Subject;

const HTTP_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(120);

/// Sweep due HTTP targets once per tick, evaluate each outcome, and forward
/// any resulting intent onto the incident queue.
pub fn spawn_http_sweep_loop(
    store: Arc<dyn Store>,
    prober: Arc<Prober>,
    evaluator: Arc<Evaluator>,
    incident_tx: mpsc::Sender<IncidentIntent>,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(HTTP_SWEEP_INTERVAL);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    let outcomes = prober.sweep(store.as_ref()).await;
                    for outcome in outcomes {
                        match evaluator.evaluate_http(store.as_ref(), outcome).await {
                            Ok(Some(intent)) => {
                                if incident_tx.send(intent).await.is_err() {
                                    return;
                                }
                            }
                            Ok(None) => {}
                            Err(err) => tracing::warn!(error = %err, "http evaluation failed"),
                        }
                    }
                }
            }
        }
    })
}

/// Scan for machines that have gone silent past their client's heartbeat
/// threshold and evaluate each as a synthetic heartbeat subject, forwarding
/// any resulting open intent onto the incident queue exactly like the HTTP
/// sweep does. Recovery happens on the machine's next ingest, not here.
pub fn spawn_heartbeat_loop(
    store: Arc<dyn Store>,
    evaluator: Arc<Evaluator>,
    default_threshold_minutes: i64,
    incident_tx: mpsc::Sender<IncidentIntent>,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    let now = chrono::Utc::now();
                    match store.list_overdue_machines(now, default_threshold_minutes).await {
                        Ok(machines) => {
                            for machine in machines {
                                tracing::warn!(
                                    client_id = %machine.client_id,
                                    machine_id = %machine.id,
                                    hostname = %machine.hostname,
                                    last_seen = %machine.last_seen,
                                    "machine heartbeat overdue"
                                );
                                let subject = Subject::Heartbeat {
                                    client_id: machine.client_id,
                                    machine_id: machine.id,
                                };
                                if let Some(intent) = evaluator.evaluate_heartbeat(subject) {
                                    if incident_tx.send(intent).await.is_err() {
                                        return;
                                    }
                                }
                            }
                        }
                        Err(err) => tracing::warn!(error = %err, "heartbeat scan failed"),
                    }
                }
            }
        }
    })
}
