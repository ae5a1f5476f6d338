//! Worker-facing ingestion boundary.
//!
//! The [`Ingestor`] is the only way the external worker can affect a run:
//! appending events, publishing metrics snapshots, and declaring completion.
//! Every operation is idempotent with respect to retries — the worker talks
//! plain request/response with no transaction coordination, so duplicate and
//! out-of-order deliveries are the normal case, not the exception.
//!
//! ## Per-Run Serialization
//!
//! Status is the one piece of shared mutable state that needs a consistency
//! discipline. All operations that read-modify-write a run's status execute
//! under that run's async lock ([`RunLocks`]), so two concurrent `post_event`
//! calls for the same run cannot race to produce an inconsistent status.
//! Event appends themselves order by the store-assigned `seq`, not by
//! arrival time.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};

use runway_core::RunId;

use crate::error::{Error, Result};
use crate::event::{EventLevel, Model, RunEvent};
use crate::run::{JsonMap, Run};
use crate::metrics;
use crate::status;
use crate::store::Store;

/// Per-run async locks serializing status read-modify-write cycles.
///
/// Shared between the ingestion boundary and the delegation gateway so that
/// every status transition for a run goes through the same critical section.
#[derive(Debug, Default)]
pub struct RunLocks {
    inner: Mutex<HashMap<RunId, Arc<tokio::sync::Mutex<()>>>>,
}

impl RunLocks {
    /// Creates an empty lock map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock for a run, creating it on first use.
    #[must_use]
    pub fn for_run(&self, run_id: &RunId) -> Arc<tokio::sync::Mutex<()>> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(inner.entry(*run_id).or_default())
    }
}

/// The worker-facing ingestion service.
///
/// Appends flow through the event log store, then through the status
/// inference engine, which may advance the run registry's cached status.
pub struct Ingestor {
    store: Arc<dyn Store>,
    locks: Arc<RunLocks>,
}

impl Ingestor {
    /// Creates a new ingestor over the given store and lock map.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, locks: Arc<RunLocks>) -> Self {
        Self { store, locks }
    }

    /// Appends an event and feeds it through the status inference engine.
    ///
    /// Returns the appended event. Succeeds even when the event does not
    /// change status; duplicate and out-of-order titles are not errors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RunNotFound`] for an unknown run. Storage failures
    /// propagate.
    #[tracing::instrument(
        skip(self, title, detail, ts),
        fields(run_id = %run_id, level = %level, title = title)
    )]
    pub async fn post_event(
        &self,
        run_id: &RunId,
        level: EventLevel,
        title: &str,
        detail: Option<&str>,
        ts: Option<DateTime<Utc>>,
    ) -> Result<RunEvent> {
        let lock = self.locks.for_run(run_id);
        let _guard = lock.lock().await;

        let run = self
            .store
            .get_run(run_id)
            .await?
            .ok_or(Error::RunNotFound { run_id: *run_id })?;

        let event = self
            .store
            .append_event(run_id, level, title, detail, ts)
            .await?;
        metrics::record_event_ingested(&level);

        if let Some(target) = status::infer(run.status, title) {
            let result = self.store.cas_run_status(run_id, run.status, target).await?;
            if result.is_success() {
                metrics::record_status_transition(run.status, target);
                tracing::info!(from = %run.status, to = %target, "run status advanced");
            } else {
                // The per-run lock makes this unreachable for well-behaved
                // callers; a mismatch here means a writer bypassed the lock.
                tracing::warn!(?result, "status CAS did not apply");
            }
        }

        Ok(event)
    }

    /// Replaces the run's metrics snapshot wholesale.
    ///
    /// Last write wins; no merge, and no ordering guarantee beyond "last
    /// call observed by the store". Callers needing ordered metrics must
    /// embed a step counter in the payload themselves. Does not touch
    /// status, so it does not take the per-run lock.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RunNotFound`] for an unknown run.
    #[tracing::instrument(skip(self, metrics), fields(run_id = %run_id))]
    pub async fn put_metrics(&self, run_id: &RunId, metrics: JsonMap) -> Result<Run> {
        self.store.replace_metrics(run_id, metrics).await
    }

    /// Declares the run complete and registers its model artifact.
    ///
    /// Atomic with respect to the run: status advances to `completed` and
    /// exactly one model record is created. A recognized completion event is
    /// appended in the same critical section so that replaying the log
    /// reconstructs the cached status.
    ///
    /// Safe to call more than once: calls after the run is terminal fail
    /// with [`Error::AlreadyTerminal`] and have no side effect, so a worker
    /// retrying on a flaky connection cannot create duplicate model records
    /// or resurrect a terminal run.
    ///
    /// # Errors
    ///
    /// - [`Error::RunNotFound`] for an unknown run
    /// - [`Error::AlreadyTerminal`] if the run already finished
    /// - [`Error::InvalidStateTransition`] if the run never reported a start
    #[tracing::instrument(skip(self), fields(run_id = %run_id, model_name = model_name))]
    pub async fn complete_run(
        &self,
        run_id: &RunId,
        model_name: &str,
        model_path: &str,
    ) -> Result<(Run, Model)> {
        let lock = self.locks.for_run(run_id);
        let _guard = lock.lock().await;

        let previous = self
            .store
            .get_run(run_id)
            .await?
            .ok_or(Error::RunNotFound { run_id: *run_id })?
            .status;

        let (run, model) = self
            .store
            .complete_run(run_id, model_name, model_path)
            .await?;

        let detail = format!("Model {model_name} registered at {model_path}");
        self.store
            .append_event(run_id, EventLevel::Info, "Run completed", Some(&detail), None)
            .await?;

        metrics::record_status_transition(previous, run.status);
        tracing::info!(model_id = %model.id, "run completed");

        Ok((run, model))
    }
}
