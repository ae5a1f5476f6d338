//! In-memory store implementation.
//!
//! This module provides [`InMemoryStore`], a simple in-memory implementation
//! of the [`Store`] trait suitable for testing and development.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: No durability, no cross-process
//!   coordination
//! - **Single-process only**: State is not shared across process boundaries
//! - **No persistence**: All state is lost when the process exits
//!
//! Event `seq` values are assigned while holding the write lock, which is
//! what turns unordered arrival into the authoritative assignment order.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use runway_core::{RunId, WorkflowId};

use super::{CasResult, RunStats, Store};
use crate::error::{Error, Result};
use crate::event::{EventLevel, Model, RunEvent};
use crate::run::{JsonMap, PipelineSpec, Run, RunStatus, Workflow};

/// Per-run state: the registry record plus its append-only event log.
#[derive(Debug)]
struct RunEntry {
    run: Run,
    events: Vec<RunEvent>,
    next_seq: u64,
}

impl RunEntry {
    fn new(run: Run) -> Self {
        Self {
            run,
            events: Vec::new(),
            next_seq: 1,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    workflows: Vec<Workflow>,
    runs: HashMap<RunId, RunEntry>,
    /// Creation order of runs, for newest-first listings.
    run_order: Vec<RunId>,
    models: Vec<Model>,
}

/// In-memory store.
///
/// Provides a simple, thread-safe implementation of the [`Store`] trait
/// using `RwLock` for synchronization.
///
/// ## Example
///
/// ```rust
/// use runway_flow::store::memory::InMemoryStore;
///
/// let store = InMemoryStore::new();
/// // Use store in tests...
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

/// Converts a lock poison error to a storage error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::storage("lock poisoned")
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of runs currently stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn run_count(&self) -> Result<usize> {
        let count = {
            let inner = self.inner.read().map_err(poison_err)?;
            inner.runs.len()
        };
        Ok(count)
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_workflow(
        &self,
        name: &str,
        pipeline_spec: Option<PipelineSpec>,
    ) -> Result<Workflow> {
        let workflow = Workflow::new(name, pipeline_spec);
        {
            let mut inner = self.inner.write().map_err(poison_err)?;
            inner.workflows.push(workflow.clone());
        }
        Ok(workflow)
    }

    async fn list_workflows(&self) -> Result<Vec<Workflow>> {
        let result = {
            let inner = self.inner.read().map_err(poison_err)?;
            let mut workflows = inner.workflows.clone();
            workflows.reverse();
            workflows
        };
        Ok(result)
    }

    async fn create_run(&self, workflow_id: Option<WorkflowId>) -> Result<Run> {
        let run = Run::new(workflow_id);
        {
            let mut inner = self.inner.write().map_err(poison_err)?;
            inner.run_order.push(run.id);
            inner.runs.insert(run.id, RunEntry::new(run.clone()));
        }
        Ok(run)
    }

    async fn get_run(&self, run_id: &RunId) -> Result<Option<Run>> {
        let result = {
            let inner = self.inner.read().map_err(poison_err)?;
            inner.runs.get(run_id).map(|entry| entry.run.clone())
        };
        Ok(result)
    }

    async fn list_runs(&self) -> Result<Vec<Run>> {
        let result = {
            let inner = self.inner.read().map_err(poison_err)?;
            inner
                .run_order
                .iter()
                .rev()
                .filter_map(|id| inner.runs.get(id).map(|entry| entry.run.clone()))
                .collect()
        };
        Ok(result)
    }

    async fn cas_run_status(
        &self,
        run_id: &RunId,
        expected: RunStatus,
        target: RunStatus,
    ) -> Result<CasResult> {
        if !expected.can_transition_to(target) {
            return Err(Error::InvalidStateTransition {
                from: expected.to_string(),
                to: target.to_string(),
                reason: "not a legal forward transition".into(),
            });
        }

        let mut inner = self.inner.write().map_err(poison_err)?;

        let Some(entry) = inner.runs.get_mut(run_id) else {
            return Ok(CasResult::NotFound);
        };

        if entry.run.status != expected {
            let actual = entry.run.status;
            return Ok(CasResult::StateMismatch { actual });
        }

        entry.run.transition_to(target)?;
        Ok(CasResult::Success)
    }

    async fn replace_metrics(&self, run_id: &RunId, metrics: JsonMap) -> Result<Run> {
        let mut inner = self.inner.write().map_err(poison_err)?;

        let Some(entry) = inner.runs.get_mut(run_id) else {
            return Err(Error::RunNotFound { run_id: *run_id });
        };

        entry.run.replace_metrics(metrics);
        Ok(entry.run.clone())
    }

    async fn complete_run(
        &self,
        run_id: &RunId,
        model_name: &str,
        model_path: &str,
    ) -> Result<(Run, Model)> {
        let mut inner = self.inner.write().map_err(poison_err)?;

        let Some(entry) = inner.runs.get_mut(run_id) else {
            return Err(Error::RunNotFound { run_id: *run_id });
        };

        if entry.run.is_terminal() {
            return Err(Error::AlreadyTerminal {
                run_id: *run_id,
                status: entry.run.status,
            });
        }

        entry.run.transition_to(RunStatus::Completed)?;
        let run = entry.run.clone();

        let model = Model::new(model_name, model_path);
        inner.models.push(model.clone());

        Ok((run, model))
    }

    async fn append_event(
        &self,
        run_id: &RunId,
        level: EventLevel,
        title: &str,
        detail: Option<&str>,
        ts: Option<DateTime<Utc>>,
    ) -> Result<RunEvent> {
        let mut inner = self.inner.write().map_err(poison_err)?;

        let Some(entry) = inner.runs.get_mut(run_id) else {
            return Err(Error::RunNotFound { run_id: *run_id });
        };

        let event = RunEvent {
            seq: entry.next_seq,
            run_id: *run_id,
            ts: ts.unwrap_or_else(Utc::now),
            level,
            title: title.to_string(),
            detail: detail.map(str::to_string),
        };
        entry.next_seq += 1;
        entry.events.push(event.clone());

        Ok(event)
    }

    async fn events_since(&self, run_id: &RunId, cursor: u64) -> Result<Vec<RunEvent>> {
        let result = {
            let inner = self.inner.read().map_err(poison_err)?;
            inner.runs.get(run_id).map_or_else(Vec::new, |entry| {
                entry
                    .events
                    .iter()
                    .filter(|event| event.seq > cursor)
                    .cloned()
                    .collect()
            })
        };
        Ok(result)
    }

    async fn list_events(&self, run_id: &RunId) -> Result<Vec<RunEvent>> {
        let result = {
            let inner = self.inner.read().map_err(poison_err)?;
            inner
                .runs
                .get(run_id)
                .map_or_else(Vec::new, |entry| entry.events.clone())
        };
        Ok(result)
    }

    async fn list_models(&self) -> Result<Vec<Model>> {
        let result = {
            let inner = self.inner.read().map_err(poison_err)?;
            let mut models = inner.models.clone();
            models.reverse();
            models
        };
        Ok(result)
    }

    async fn stats(&self) -> Result<RunStats> {
        let result = {
            let inner = self.inner.read().map_err(poison_err)?;
            let mut stats = RunStats {
                runs: inner.runs.len(),
                models: inner.models.len(),
                ..RunStats::default()
            };
            for entry in inner.runs.values() {
                match entry.run.status {
                    RunStatus::Queued => stats.queued += 1,
                    RunStatus::Running => stats.running += 1,
                    RunStatus::Completed => stats.completed += 1,
                    RunStatus::Failed => stats.failed += 1,
                }
            }
            stats
        };
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_and_get_run() -> Result<()> {
        let store = InMemoryStore::new();

        let missing = store.get_run(&RunId::generate()).await?;
        assert!(missing.is_none());

        let run = store.create_run(None).await?;
        assert_eq!(run.status, RunStatus::Queued);

        let fetched = store.get_run(&run.id).await?;
        assert_eq!(fetched.map(|r| r.id), Some(run.id));
        Ok(())
    }

    #[tokio::test]
    async fn list_runs_newest_first() -> Result<()> {
        let store = InMemoryStore::new();
        let first = store.create_run(None).await?;
        let second = store.create_run(None).await?;

        let runs = store.list_runs().await?;
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].id, second.id);
        assert_eq!(runs[1].id, first.id);
        Ok(())
    }

    #[tokio::test]
    async fn cas_run_status_success() -> Result<()> {
        let store = InMemoryStore::new();
        let run = store.create_run(None).await?;

        let result = store
            .cas_run_status(&run.id, RunStatus::Queued, RunStatus::Running)
            .await?;
        assert!(result.is_success());

        let updated = store.get_run(&run.id).await?.unwrap();
        assert_eq!(updated.status, RunStatus::Running);
        Ok(())
    }

    #[tokio::test]
    async fn cas_run_status_mismatch_leaves_status_untouched() -> Result<()> {
        let store = InMemoryStore::new();
        let run = store.create_run(None).await?;

        let result = store
            .cas_run_status(&run.id, RunStatus::Running, RunStatus::Completed)
            .await?;
        assert_eq!(
            result,
            CasResult::StateMismatch {
                actual: RunStatus::Queued
            }
        );

        let unchanged = store.get_run(&run.id).await?.unwrap();
        assert_eq!(unchanged.status, RunStatus::Queued);
        Ok(())
    }

    #[tokio::test]
    async fn cas_run_status_rejects_illegal_pair() -> Result<()> {
        let store = InMemoryStore::new();
        let run = store.create_run(None).await?;

        let result = store
            .cas_run_status(&run.id, RunStatus::Completed, RunStatus::Running)
            .await;
        assert!(matches!(result, Err(Error::InvalidStateTransition { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn cas_run_status_not_found() -> Result<()> {
        let store = InMemoryStore::new();
        let result = store
            .cas_run_status(&RunId::generate(), RunStatus::Queued, RunStatus::Running)
            .await?;
        assert!(result.is_not_found());
        Ok(())
    }

    #[tokio::test]
    async fn append_assigns_monotone_seq() -> Result<()> {
        let store = InMemoryStore::new();
        let run = store.create_run(None).await?;

        let a = store
            .append_event(&run.id, EventLevel::Info, "Run queued", None, None)
            .await?;
        let b = store
            .append_event(&run.id, EventLevel::Info, "Run started", None, None)
            .await?;
        let c = store
            .append_event(&run.id, EventLevel::Info, "Step 1", Some("detail"), None)
            .await?;

        assert_eq!((a.seq, b.seq, c.seq), (1, 2, 3));
        Ok(())
    }

    #[tokio::test]
    async fn append_rejects_unknown_run() {
        let store = InMemoryStore::new();
        let result = store
            .append_event(&RunId::generate(), EventLevel::Info, "Run queued", None, None)
            .await;
        assert!(matches!(result, Err(Error::RunNotFound { .. })));
    }

    #[tokio::test]
    async fn events_since_returns_strictly_after_cursor() -> Result<()> {
        let store = InMemoryStore::new();
        let run = store.create_run(None).await?;

        // Supply deliberately out-of-order timestamps: log order, not
        // wall-clock, governs.
        let late = Utc::now() + chrono::Duration::hours(1);
        let early = Utc::now() - chrono::Duration::hours(1);

        let a = store
            .append_event(&run.id, EventLevel::Info, "A", None, Some(late))
            .await?;
        let b = store
            .append_event(&run.id, EventLevel::Info, "B", None, Some(early))
            .await?;
        let c = store
            .append_event(&run.id, EventLevel::Info, "C", None, None)
            .await?;

        let tail = store.events_since(&run.id, a.seq).await?;
        let titles: Vec<&str> = tail.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["B", "C"]);
        assert_eq!(tail[0].seq, b.seq);
        assert_eq!(tail[1].seq, c.seq);

        // No progress since the last event is an empty vec, not an error.
        let empty = store.events_since(&run.id, c.seq).await?;
        assert!(empty.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn events_since_tolerates_unknown_run() -> Result<()> {
        let store = InMemoryStore::new();
        let events = store.events_since(&RunId::generate(), 0).await?;
        assert!(events.is_empty());

        let all = store.list_events(&RunId::generate()).await?;
        assert!(all.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn complete_run_is_atomic_and_guarded() -> Result<()> {
        let store = InMemoryStore::new();
        let run = store.create_run(None).await?;
        store
            .cas_run_status(&run.id, RunStatus::Queued, RunStatus::Running)
            .await?;

        let (completed, model) = store.complete_run(&run.id, "m1", "/x").await?;
        assert_eq!(completed.status, RunStatus::Completed);
        assert_eq!(model.name, "m1");
        assert_eq!(model.path, "/x");

        // The idempotency guard: a retried completion neither errors the
        // first result nor creates a second model.
        let second = store.complete_run(&run.id, "m1", "/x").await;
        assert!(matches!(second, Err(Error::AlreadyTerminal { .. })));
        assert_eq!(store.list_models().await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn complete_run_requires_a_started_run() -> Result<()> {
        let store = InMemoryStore::new();
        let run = store.create_run(None).await?;

        let result = store.complete_run(&run.id, "m1", "/x").await;
        assert!(matches!(result, Err(Error::InvalidStateTransition { .. })));
        assert!(store.list_models().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn replace_metrics_last_write_wins() -> Result<()> {
        let store = InMemoryStore::new();
        let run = store.create_run(None).await?;

        let mut first = JsonMap::new();
        first.insert("step".into(), 1.into());
        store.replace_metrics(&run.id, first).await?;

        let mut second = JsonMap::new();
        second.insert("step".into(), 2.into());
        let updated = store.replace_metrics(&run.id, second).await?;

        assert_eq!(
            updated.metrics.unwrap().get("step"),
            Some(&serde_json::json!(2))
        );
        Ok(())
    }

    #[tokio::test]
    async fn stats_counts_by_status() -> Result<()> {
        let store = InMemoryStore::new();
        store.create_run(None).await?;
        let running = store.create_run(None).await?;
        store
            .cas_run_status(&running.id, RunStatus::Queued, RunStatus::Running)
            .await?;

        let stats = store.stats().await?;
        assert_eq!(stats.runs, 2);
        assert_eq!(stats.queued, 1);
        assert_eq!(stats.running, 1);
        assert_eq!(stats.completed, 0);
        assert_eq!(stats.models, 0);
        Ok(())
    }

    #[tokio::test]
    async fn workflows_round_trip() -> Result<()> {
        let store = InMemoryStore::new();
        let workflow = store.create_workflow("nightly-train", None).await?;

        let listed = store.list_workflows().await?;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, workflow.id);
        assert_eq!(listed[0].name, "nightly-train");
        Ok(())
    }
}
