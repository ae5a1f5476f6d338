//! Run and workflow records.
//!
//! A run represents a single execution of a (possibly ad-hoc) pipeline,
//! performed out-of-process by an external worker and tracked here through a
//! status lifecycle. The run's cached `status` is a derived projection of its
//! append-only event log (see [`crate::status`]); it only ever advances
//! forward and terminal states are sticky.
//!
//! ## Status Replay
//!
//! Runs are designed so that replaying a run's event log in assignment order
//! through the status inference engine reconstructs the cached status:
//!
//! 1. Load all events for the run, ordered by `seq`.
//! 2. Fold each event through [`crate::status::infer`] starting from
//!    [`RunStatus::Queued`].
//! 3. The fold result equals the registry's cached `Run::status`.
//!
//! Paths that advance status through explicit API calls (completion,
//! delegation failure) append a recognized event as part of the same
//! critical section, which is what keeps the replay equivalence intact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use runway_core::{RunId, WorkflowId};

use crate::error::{Error, Result};

/// A JSON object used for free-form parameter and metrics payloads.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Run state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Created, waiting to be handed to the worker.
    Queued,
    /// The worker has picked up the run and reported progress.
    Running,
    /// The run finished and registered its artifact.
    Completed,
    /// Delegation failed or the worker reported failure.
    Failed,
}

impl RunStatus {
    /// Returns true if this is a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if the transition from self to target is valid.
    ///
    /// The only legal edges are `queued -> running`, `queued -> failed`
    /// (delegation failure), `running -> completed`, and `running -> failed`.
    /// There is no edge back to `queued`, and no edge out of a terminal
    /// state.
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        match self {
            Self::Queued => matches!(target, Self::Running | Self::Failed),
            Self::Running => matches!(target, Self::Completed | Self::Failed),
            Self::Completed | Self::Failed => false,
        }
    }
}

impl Default for RunStatus {
    fn default() -> Self {
        Self::Queued
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One typed step in a pipeline specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSpec {
    /// Step type discriminator (free-form, interpreted by the worker).
    #[serde(rename = "type")]
    pub step_type: String,
    /// Free-form parameter mapping for the step.
    #[serde(default)]
    pub params: JsonMap,
}

/// An ordered sequence of typed steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSpec {
    /// Steps in execution order.
    pub steps: Vec<StepSpec>,
}

/// A named, optionally-specified pipeline definition that runs may
/// originate from. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    /// Unique workflow identifier.
    pub id: WorkflowId,
    /// Display name.
    pub name: String,
    /// Optional pipeline specification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline_spec: Option<PipelineSpec>,
    /// When the workflow was created.
    pub created_at: DateTime<Utc>,
}

impl Workflow {
    /// Creates a new workflow record.
    #[must_use]
    pub fn new(name: impl Into<String>, pipeline_spec: Option<PipelineSpec>) -> Self {
        Self {
            id: WorkflowId::generate(),
            name: name.into(),
            pipeline_spec,
            created_at: Utc::now(),
        }
    }
}

/// A tracked execution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    /// Unique run identifier.
    pub id: RunId,
    /// The workflow this run originated from, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<WorkflowId>,
    /// Current status; a cached projection of the event log.
    pub status: RunStatus,
    /// Latest metrics snapshot reported by the worker.
    ///
    /// Wholesale-replaced on every report, never merged. Callers needing
    /// ordered metrics must embed a step counter in the payload themselves.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<JsonMap>,
    /// When the run was created.
    pub created_at: DateTime<Utc>,
    /// When the run record was last mutated.
    pub updated_at: DateTime<Utc>,
}

impl Run {
    /// Creates a new run in the `queued` state.
    #[must_use]
    pub fn new(workflow_id: Option<WorkflowId>) -> Self {
        let now = Utc::now();
        Self {
            id: RunId::generate(),
            workflow_id,
            status: RunStatus::Queued,
            metrics: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true if the run is in a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Transitions to a new status.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStateTransition`] if the transition is not a
    /// legal forward edge of the state machine.
    #[tracing::instrument(skip(self), fields(run_id = %self.id, from = %self.status, to = %target))]
    pub fn transition_to(&mut self, target: RunStatus) -> Result<()> {
        if !self.status.can_transition_to(target) {
            return Err(Error::InvalidStateTransition {
                from: self.status.to_string(),
                to: target.to_string(),
                reason: "not a legal forward transition".into(),
            });
        }

        self.status = target;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Replaces the metrics snapshot wholesale.
    pub fn replace_metrics(&mut self, metrics: JsonMap) {
        self.metrics = Some(metrics);
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queued_is_default_and_not_terminal() {
        assert_eq!(RunStatus::default(), RunStatus::Queued);
        assert!(!RunStatus::Queued.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
    }

    #[test]
    fn legal_transitions_only_move_forward() {
        assert!(RunStatus::Queued.can_transition_to(RunStatus::Running));
        assert!(RunStatus::Queued.can_transition_to(RunStatus::Failed));
        assert!(RunStatus::Running.can_transition_to(RunStatus::Completed));
        assert!(RunStatus::Running.can_transition_to(RunStatus::Failed));

        assert!(!RunStatus::Queued.can_transition_to(RunStatus::Completed));
        assert!(!RunStatus::Running.can_transition_to(RunStatus::Queued));
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for terminal in [RunStatus::Completed, RunStatus::Failed] {
            for target in [
                RunStatus::Queued,
                RunStatus::Running,
                RunStatus::Completed,
                RunStatus::Failed,
            ] {
                assert!(!terminal.can_transition_to(target));
            }
        }
    }

    #[test]
    fn run_transition_updates_timestamp() -> Result<()> {
        let mut run = Run::new(None);
        let created = run.updated_at;

        run.transition_to(RunStatus::Running)?;
        assert_eq!(run.status, RunStatus::Running);
        assert!(run.updated_at >= created);
        Ok(())
    }

    #[test]
    fn run_rejects_illegal_transition() {
        let mut run = Run::new(None);
        let result = run.transition_to(RunStatus::Completed);
        assert!(matches!(result, Err(Error::InvalidStateTransition { .. })));
        assert_eq!(run.status, RunStatus::Queued);
    }

    #[test]
    fn metrics_are_replaced_wholesale() {
        let mut run = Run::new(None);

        let mut first = JsonMap::new();
        first.insert("step".into(), 1.into());
        first.insert("loss".into(), serde_json::json!(0.7));
        run.replace_metrics(first);

        let mut second = JsonMap::new();
        second.insert("accuracy".into(), serde_json::json!(0.94));
        run.replace_metrics(second);

        let metrics = run.metrics.as_ref().unwrap();
        assert!(metrics.contains_key("accuracy"));
        // Old keys do not survive a replacement.
        assert!(!metrics.contains_key("step"));
        assert!(!metrics.contains_key("loss"));
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&RunStatus::Queued).unwrap();
        assert_eq!(json, "\"queued\"");
    }

    #[test]
    fn step_spec_uses_type_discriminator() {
        let spec: StepSpec = serde_json::from_str(r#"{"type": "train", "params": {"epochs": 3}}"#)
            .expect("step spec should parse");
        assert_eq!(spec.step_type, "train");
        assert_eq!(spec.params.get("epochs"), Some(&serde_json::json!(3)));
    }
}
