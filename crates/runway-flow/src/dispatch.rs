//! Delegation of queued runs to the external worker.
//!
//! This module provides:
//!
//! - [`WorkerClient`]: Trait for the worker's start endpoint
//! - [`HttpWorkerClient`]: Production HTTP client with a bounded timeout
//! - [`DelegationGateway`]: Hands a freshly queued run to the worker
//!
//! ## Design Principles
//!
//! - **Best effort**: One call, bounded timeout, no automatic retry
//!   (retries are an explicit operator action)
//! - **Local recovery**: A failed handoff transitions the run to `failed`
//!   with a recorded reason; the run record is the error-reporting channel,
//!   so delegation failure is never propagated to the run's creator
//! - **Response body ignored**: Any non-success status or transport error
//!   counts as delegation failure

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use runway_core::RunId;

use crate::error::{Error, Result};
use crate::event::EventLevel;
use crate::ingest::RunLocks;
use crate::metrics;
use crate::run::RunStatus;
use crate::store::{CasResult, Store};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the external worker's start endpoint.
///
/// ## Thread Safety
///
/// Implementations are `Send + Sync` so the gateway can be shared across
/// request handlers.
#[async_trait]
pub trait WorkerClient: Send + Sync {
    /// Asks the worker to start executing the given run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Delegation`] on timeout, connection error, or a
    /// non-success response.
    async fn start_run(&self, run_id: RunId) -> Result<()>;
}

/// HTTP client for the worker's `POST /start/{run_id}` endpoint.
///
/// The request timeout is mandatory: a hung worker must not hang the
/// orchestration path.
#[derive(Debug, Clone)]
pub struct HttpWorkerClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpWorkerClient {
    /// Creates a new client targeting the given base URL with the default
    /// request timeout.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Creates a new client with an explicit request timeout.
    #[must_use]
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    fn start_url(&self, run_id: RunId) -> String {
        format!("{}/start/{run_id}", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl WorkerClient for HttpWorkerClient {
    async fn start_run(&self, run_id: RunId) -> Result<()> {
        let response = self
            .client
            .post(self.start_url(run_id))
            .send()
            .await
            .map_err(|e| Error::delegation(format!("worker start request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        // The response body is not inspected; the status line is the contract.
        Err(Error::delegation(format!(
            "worker start returned {status}"
        )))
    }
}

/// Outcome of a delegation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DelegationOutcome {
    /// The worker accepted the handoff; its own events drive the run from
    /// here on.
    Accepted,
    /// The handoff failed; the run was transitioned to `failed` with the
    /// reason recorded as an error event.
    Failed {
        /// Description of the handoff failure.
        reason: String,
    },
}

impl DelegationOutcome {
    /// Returns true if the worker accepted the handoff.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Hands freshly queued runs to the external worker.
pub struct DelegationGateway {
    store: Arc<dyn Store>,
    worker: Arc<dyn WorkerClient>,
    locks: Arc<RunLocks>,
}

impl DelegationGateway {
    /// Creates a new gateway.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, worker: Arc<dyn WorkerClient>, locks: Arc<RunLocks>) -> Self {
        Self {
            store,
            worker,
            locks,
        }
    }

    /// Attempts to hand the run to the worker.
    ///
    /// On success an info event records the accepted handoff and status is
    /// left alone — the worker's own callbacks drive it from here. On
    /// failure the run is synchronously transitioned to `failed` with an
    /// error event carrying the failure detail; the failure is reported via
    /// the returned outcome, never as an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RunNotFound`] for an unknown run. Storage failures
    /// propagate.
    #[tracing::instrument(skip(self), fields(run_id = %run_id))]
    pub async fn delegate(&self, run_id: &RunId) -> Result<DelegationOutcome> {
        let run = self
            .store
            .get_run(run_id)
            .await?
            .ok_or(Error::RunNotFound { run_id: *run_id })?;
        tracing::debug!(status = %run.status, "delegating run to worker");

        match self.worker.start_run(*run_id).await {
            Ok(()) => {
                self.store
                    .append_event(
                        run_id,
                        EventLevel::Info,
                        "Delegation accepted",
                        Some("Worker acknowledged start"),
                        None,
                    )
                    .await?;
                metrics::record_delegation("accepted");
                Ok(DelegationOutcome::Accepted)
            }
            Err(err) => {
                let reason = err.to_string();
                self.fail_run(run_id, &reason).await?;
                metrics::record_delegation("failed");
                tracing::warn!(reason = %reason, "delegation failed; run marked failed");
                Ok(DelegationOutcome::Failed { reason })
            }
        }
    }

    /// Records the delegation failure and fails the run if it is still
    /// queued.
    async fn fail_run(&self, run_id: &RunId, reason: &str) -> Result<()> {
        let lock = self.locks.for_run(run_id);
        let _guard = lock.lock().await;

        // Synthesized event first, then the cached status; the title carries
        // the recognized prefix so log replay agrees with the cache.
        self.store
            .append_event(run_id, EventLevel::Error, "Delegation failed", Some(reason), None)
            .await?;

        match self
            .store
            .cas_run_status(run_id, RunStatus::Queued, RunStatus::Failed)
            .await?
        {
            CasResult::Success => {
                metrics::record_status_transition(RunStatus::Queued, RunStatus::Failed);
            }
            CasResult::StateMismatch { actual } => {
                // The worker raced ahead of the failure report; leave the
                // run to its own events.
                tracing::debug!(status = %actual, "run advanced before failure was recorded");
            }
            CasResult::NotFound => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::RunLocks;
    use crate::store::memory::InMemoryStore;

    /// Worker that always accepts or always refuses.
    struct FixedWorker {
        accept: bool,
    }

    #[async_trait]
    impl WorkerClient for FixedWorker {
        async fn start_run(&self, _run_id: RunId) -> Result<()> {
            if self.accept {
                Ok(())
            } else {
                Err(Error::delegation("connection refused"))
            }
        }
    }

    fn gateway(store: &Arc<InMemoryStore>, worker: Arc<dyn WorkerClient>) -> DelegationGateway {
        DelegationGateway::new(store.clone(), worker, Arc::new(RunLocks::new()))
    }

    #[tokio::test]
    async fn accepted_delegation_leaves_status_queued() -> Result<()> {
        let store = Arc::new(InMemoryStore::new());
        let gateway = gateway(&store, Arc::new(FixedWorker { accept: true }));
        let run = store.create_run(None).await?;

        let outcome = gateway.delegate(&run.id).await?;
        assert!(outcome.is_accepted());

        let updated = store.get_run(&run.id).await?.unwrap();
        assert_eq!(updated.status, RunStatus::Queued);

        let events = store.list_events(&run.id).await?;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Delegation accepted");
        assert_eq!(events[0].level, EventLevel::Info);
        Ok(())
    }

    #[tokio::test]
    async fn failed_delegation_fails_the_run_with_one_error_event() -> Result<()> {
        let store = Arc::new(InMemoryStore::new());
        let gateway = gateway(&store, Arc::new(FixedWorker { accept: false }));
        let run = store.create_run(None).await?;

        let outcome = gateway.delegate(&run.id).await?;
        assert!(matches!(outcome, DelegationOutcome::Failed { .. }));

        let updated = store.get_run(&run.id).await?.unwrap();
        assert_eq!(updated.status, RunStatus::Failed);

        let errors: Vec<_> = store
            .list_events(&run.id)
            .await?
            .into_iter()
            .filter(|e| e.level == EventLevel::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].title, "Delegation failed");
        assert!(errors[0].detail.as_deref().unwrap().contains("connection refused"));
        Ok(())
    }

    #[tokio::test]
    async fn delegate_rejects_unknown_run() {
        let store = Arc::new(InMemoryStore::new());
        let gateway = gateway(&store, Arc::new(FixedWorker { accept: true }));

        let result = gateway.delegate(&RunId::generate()).await;
        assert!(matches!(result, Err(Error::RunNotFound { .. })));
    }

    #[tokio::test]
    async fn late_failure_does_not_regress_a_running_run() -> Result<()> {
        let store = Arc::new(InMemoryStore::new());
        let gateway = gateway(&store, Arc::new(FixedWorker { accept: false }));
        let run = store.create_run(None).await?;

        // The worker's start signal lands before the failure is recorded.
        store
            .cas_run_status(&run.id, RunStatus::Queued, RunStatus::Running)
            .await?;

        let outcome = gateway.delegate(&run.id).await?;
        assert!(matches!(outcome, DelegationOutcome::Failed { .. }));

        let updated = store.get_run(&run.id).await?.unwrap();
        assert_eq!(updated.status, RunStatus::Running);
        Ok(())
    }

    mod http_client {
        use super::*;
        use axum::routing::post;
        use axum::Router;

        async fn spawn_worker(status: axum::http::StatusCode, delay: Duration) -> String {
            let app = Router::new().route(
                "/start/:run_id",
                post(move || async move {
                    tokio::time::sleep(delay).await;
                    status
                }),
            );

            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("bind");
            let addr = listener.local_addr().expect("local addr");
            tokio::spawn(async move {
                let _ = axum::serve(listener, app).await;
            });

            format!("http://{addr}")
        }

        #[tokio::test]
        async fn start_run_succeeds_on_2xx() {
            let base = spawn_worker(axum::http::StatusCode::OK, Duration::ZERO).await;
            let client = HttpWorkerClient::new(base);

            let result = client.start_run(RunId::generate()).await;
            assert!(result.is_ok());
        }

        #[tokio::test]
        async fn start_run_fails_on_non_success_status() {
            let base =
                spawn_worker(axum::http::StatusCode::INTERNAL_SERVER_ERROR, Duration::ZERO).await;
            let client = HttpWorkerClient::new(base);

            let result = client.start_run(RunId::generate()).await;
            assert!(matches!(result, Err(Error::Delegation { .. })));
        }

        #[tokio::test]
        async fn start_run_fails_on_timeout() {
            // Worker sleeps far longer than the client timeout.
            let base = spawn_worker(axum::http::StatusCode::OK, Duration::from_secs(30)).await;
            let client = HttpWorkerClient::with_timeout(base, Duration::from_millis(100));

            let result = client.start_run(RunId::generate()).await;
            assert!(matches!(result, Err(Error::Delegation { .. })));
        }

        #[tokio::test]
        async fn timing_out_worker_leaves_run_failed() -> Result<()> {
            let base = spawn_worker(axum::http::StatusCode::OK, Duration::from_secs(30)).await;
            let client = Arc::new(HttpWorkerClient::with_timeout(
                base,
                Duration::from_millis(100),
            ));

            let store = Arc::new(InMemoryStore::new());
            let gateway = gateway(&store, client);
            let run = store.create_run(None).await?;

            let outcome = gateway.delegate(&run.id).await?;
            assert!(matches!(outcome, DelegationOutcome::Failed { .. }));

            let updated = store.get_run(&run.id).await?.unwrap();
            assert_eq!(updated.status, RunStatus::Failed);

            let error_events = store
                .list_events(&run.id)
                .await?
                .into_iter()
                .filter(|e| e.level == EventLevel::Error)
                .count();
            assert_eq!(error_events, 1);
            Ok(())
        }
    }
}
