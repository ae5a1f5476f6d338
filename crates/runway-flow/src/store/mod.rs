//! Pluggable storage for runs, workflows, events, and model records.
//!
//! The [`Store`] trait is the persistence boundary of the orchestration
//! domain: a run registry (status, workflow linkage, metrics), the per-run
//! append-only event log, and the model artifact records created at
//! completion.
//!
//! ## Design Principles
//!
//! - **CAS semantics**: Status transitions use compare-and-swap to prevent
//!   races between concurrent writers
//! - **Append-only log**: Events have no update or delete operation;
//!   corrections are expressed as new events
//! - **Explicit handle**: The store is constructed at process start and
//!   injected into each component, never imported as ambient state
//! - **Testability**: In-memory implementation for tests and development

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use runway_core::{RunId, WorkflowId};

use crate::error::Result;
use crate::event::{EventLevel, Model, RunEvent};
use crate::run::{JsonMap, PipelineSpec, Run, RunStatus, Workflow};

/// Result of a compare-and-swap status transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasResult {
    /// The transition was applied.
    Success,
    /// The run does not exist.
    NotFound,
    /// The current status didn't match the expected value; nothing changed.
    StateMismatch {
        /// The actual status that was found.
        actual: RunStatus,
    },
}

impl CasResult {
    /// Returns true if the transition was applied.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns true if the run was not found.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// Aggregate run/model counts for the insights surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Total number of runs.
    pub runs: usize,
    /// Runs currently queued.
    pub queued: usize,
    /// Runs currently running.
    pub running: usize,
    /// Runs that completed.
    pub completed: usize,
    /// Runs that failed.
    pub failed: usize,
    /// Registered model records.
    pub models: usize,
}

/// Storage abstraction for orchestration state.
///
/// ## CAS Semantics
///
/// [`Store::cas_run_status`] is the core primitive for correctness under
/// concurrent writers: a transition only applies when the current status
/// matches the expected one, so duplicate deliveries collapse into a single
/// state change. An `expected -> target` pair that is not a legal forward
/// edge of the state machine is a caller defect and fails with
/// `InvalidStateTransition` rather than being silently clamped.
///
/// ## Thread Safety
///
/// All methods are `Send + Sync` to support concurrent access from request
/// handlers and background tasks.
#[async_trait]
pub trait Store: Send + Sync {
    // --- Workflow operations ---

    /// Creates a workflow.
    async fn create_workflow(
        &self,
        name: &str,
        pipeline_spec: Option<PipelineSpec>,
    ) -> Result<Workflow>;

    /// Lists all workflows, newest first.
    async fn list_workflows(&self) -> Result<Vec<Workflow>>;

    // --- Run registry operations ---

    /// Creates a run in the `queued` state.
    async fn create_run(&self, workflow_id: Option<WorkflowId>) -> Result<Run>;

    /// Gets a run by ID.
    ///
    /// Returns `None` if the run does not exist.
    async fn get_run(&self, run_id: &RunId) -> Result<Option<Run>>;

    /// Lists all runs, newest first.
    async fn list_runs(&self) -> Result<Vec<Run>>;

    /// Atomically transitions run status if the current status matches
    /// `expected`.
    ///
    /// # Returns
    ///
    /// - `CasResult::Success` if the transition was applied
    /// - `CasResult::NotFound` if the run doesn't exist
    /// - `CasResult::StateMismatch` if the current status doesn't match
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` when `expected -> target` is not a
    /// legal forward edge (a caller defect, distinct from a benign mismatch).
    async fn cas_run_status(
        &self,
        run_id: &RunId,
        expected: RunStatus,
        target: RunStatus,
    ) -> Result<CasResult>;

    /// Replaces the run's metrics snapshot wholesale. Last write wins.
    ///
    /// # Errors
    ///
    /// Returns `RunNotFound` if the run does not exist.
    async fn replace_metrics(&self, run_id: &RunId, metrics: JsonMap) -> Result<Run>;

    /// Completes a run: advances status to `completed` and registers exactly
    /// one model record, atomically.
    ///
    /// # Errors
    ///
    /// - `RunNotFound` if the run does not exist
    /// - `AlreadyTerminal` if the run is already `completed` or `failed`
    ///   (the idempotency guard for retried completion calls)
    /// - `InvalidStateTransition` if the run never left `queued`
    async fn complete_run(
        &self,
        run_id: &RunId,
        model_name: &str,
        model_path: &str,
    ) -> Result<(Run, Model)>;

    // --- Event log operations ---

    /// Appends an event to the run's log, assigning the next per-run `seq`.
    ///
    /// `ts` is caller-supplied and purely informational; log order is the
    /// contract.
    ///
    /// # Errors
    ///
    /// Returns `RunNotFound` if the run does not exist.
    async fn append_event(
        &self,
        run_id: &RunId,
        level: EventLevel,
        title: &str,
        detail: Option<&str>,
        ts: Option<DateTime<Utc>>,
    ) -> Result<RunEvent>;

    /// Returns all events with `seq` strictly greater than `cursor`, in
    /// ascending order.
    ///
    /// An empty vec is a valid, non-error result meaning "no progress since
    /// last check" — including for runs that do not exist (tailers must
    /// tolerate a run disappearing).
    async fn events_since(&self, run_id: &RunId, cursor: u64) -> Result<Vec<RunEvent>>;

    /// Returns the run's full event history in ascending order.
    ///
    /// Returns an empty vec for unknown runs, like [`Store::events_since`].
    async fn list_events(&self, run_id: &RunId) -> Result<Vec<RunEvent>>;

    // --- Model records ---

    /// Lists registered models, newest first.
    async fn list_models(&self) -> Result<Vec<Model>>;

    // --- Aggregates ---

    /// Returns aggregate run/model counts.
    async fn stats(&self) -> Result<RunStats>;
}
