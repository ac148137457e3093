//! HTTP prober: periodically checks due targets with bounded concurrency.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::store::Store;
use crate::types::{ClientId, HttpMethod, HttpTarget, HttpTargetId};

/// The outcome of probing one target, consumed as a pseudo-sample by the evaluator.
#[derive(Debug, Clone, Copy)]
pub struct ProbeOutcome {
    /// Owning tenant.
    pub client_id: ClientId,
    /// The probed target.
    pub http_target_id: HttpTargetId,
    /// Whether the observed status was in the target's accepted set.
    pub ok: bool,
    /// Observed status code, or 0 for a transport-level failure.
    pub status: u16,
    /// Observed latency in milliseconds.
    pub latency_ms: u64,
}

/// Per-client secondary concurrency cap, so one tenant with many slow
/// targets cannot starve another tenant's sweep within the same tick.
struct ClientLimiter {
    limiters: Mutex<HashMap<ClientId, Arc<Semaphore>>>,
    per_client_permits: usize,
}

impl ClientLimiter {
    fn new(per_client_permits: usize) -> Self {
        Self {
            limiters: Mutex::new(HashMap::new()),
            per_client_permits,
        }
    }

    fn for_client(&self, client_id: ClientId) -> Arc<Semaphore> {
        let mut limiters = self.limiters.lock();
        limiters
            .entry(client_id)
            .or_insert_with(|| Arc::new(Semaphore::new(self.per_client_permits)))
            .clone()
    }
}

/// Runs the probe sweep: selects due targets, probes them with bounded
/// concurrency, persists the check result, and returns probe outcomes for
/// the evaluator.
pub struct Prober {
    http: reqwest::Client,
    global: Arc<Semaphore>,
    per_client: ClientLimiter,
    max_redirects: usize,
}

impl Prober {
    /// Construct a prober with the given global concurrency cap.
    ///
    /// `max_redirects` caps redirects the underlying client follows; the
    /// shared outbound client used elsewhere in the process follows none.
    pub fn new(global_concurrency: usize, max_redirects: usize) -> Self {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(max_redirects))
            .build()
            .expect("reqwest client build cannot fail with these options");

        let per_client_permits = (global_concurrency / 4).max(1);
        Self {
            http,
            global: Arc::new(Semaphore::new(global_concurrency)),
            per_client: ClientLimiter::new(per_client_permits),
            max_redirects,
        }
    }

    /// Run one sweep: fetch due targets from the store, probe them all
    /// concurrently (bounded), persist results, and return the outcomes.
    pub async fn sweep(&self, store: &dyn Store) -> Vec<ProbeOutcome> {
        let now = Utc::now();
        let due = match store.list_due_http_targets(now).await {
            Ok(targets) => targets,
            Err(err) => {
                tracing::warn!(error = %err, "failed to list due http targets");
                return Vec::new();
            }
        };

        let mut handles = Vec::with_capacity(due.len());
        for target in due {
            let global = self.global.clone();
            let per_client = self.per_client.for_client(target.client_id);
            let http = self.http.clone();
            handles.push(tokio::spawn(async move {
                let _global_permit = global.acquire_owned().await.expect("semaphore not closed");
                let _client_permit = per_client.acquire_owned().await.expect("semaphore not closed");
                probe_one(&http, target).await
            }));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok((target, outcome)) => {
                    if let Err(err) = store.update_http_target_check(&target).await {
                        tracing::warn!(error = %err, target_id = %target.id, "failed to persist probe result");
                    }
                    outcomes.push(outcome);
                }
                Err(err) => tracing::warn!(error = %err, "probe task panicked"),
            }
        }
        outcomes
    }

    /// Configured redirect bound, exposed for diagnostics/tests.
    pub fn max_redirects(&self) -> usize {
        self.max_redirects
    }
}

async fn probe_one(http: &reqwest::Client, mut target: HttpTarget) -> (HttpTarget, ProbeOutcome) {
    let method = match target.method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Head => reqwest::Method::HEAD,
        HttpMethod::Post => reqwest::Method::POST,
    };

    let started = std::time::Instant::now();
    let request = http
        .request(method, &target.url)
        .timeout(Duration::from_millis(target.timeout_ms));

    let (status, ok_transport) = match request.send().await {
        Ok(response) => (response.status().as_u16(), true),
        Err(_) => (0, false),
    };
    let latency_ms = started.elapsed().as_millis() as u64;

    let ok = ok_transport && target.is_accepted(status);

    target.last_check_at = Some(Utc::now());
    target.last_status = Some(status);
    target.last_latency_ms = Some(latency_ms);

    let outcome = ProbeOutcome {
        client_id: target.client_id,
        http_target_id: target.id,
        ok,
        status,
        latency_ms,
    };

    (target, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use crate::types::HttpTargetId;

    fn make_target(client_id: ClientId, url: &str) -> HttpTarget {
        HttpTarget {
            id: HttpTargetId::new(),
            client_id,
            name: "T".into(),
            url: url.into(),
            method: HttpMethod::Get,
            accepted_status_codes: vec![],
            timeout_ms: 2000,
            check_interval_s: 60,
            is_active: true,
            last_check_at: None,
            last_status: None,
            last_latency_ms: None,
        }
    }

    #[tokio::test]
    async fn unreachable_host_normalizes_to_status_zero() {
        let client_id = ClientId::new();
        let target = make_target(client_id, "http://127.0.0.1:1");
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(500))
            .build()
            .unwrap();
        let (_, outcome) = probe_one(&http, target).await;
        assert_eq!(outcome.status, 0);
        assert!(!outcome.ok);
    }

    #[tokio::test]
    async fn sweep_with_no_due_targets_returns_empty() {
        let store = InMemoryStore::new();
        let prober = Prober::new(4, 3);
        let outcomes = prober.sweep(&store).await;
        assert!(outcomes.is_empty());
    }
}
