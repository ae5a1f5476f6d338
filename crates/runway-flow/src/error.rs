//! Error types for the run orchestration domain.

use runway_core::{RunId, WorkflowId};

use crate::run::RunStatus;

/// The result type used throughout runway-flow.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in orchestration operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A run was not found.
    #[error("run not found: {run_id}")]
    RunNotFound {
        /// The run ID that was not found.
        run_id: RunId,
    },

    /// A workflow was not found.
    #[error("workflow not found: {workflow_id}")]
    WorkflowNotFound {
        /// The workflow ID that was not found.
        workflow_id: WorkflowId,
    },

    /// An invalid state transition was attempted.
    ///
    /// This is a programming-level misuse of the registry API, not a user
    /// error; callers must only request legal forward transitions.
    #[error("invalid state transition: {from} -> {to} ({reason})")]
    InvalidStateTransition {
        /// The current state.
        from: String,
        /// The attempted target state.
        to: String,
        /// The reason the transition is invalid.
        reason: String,
    },

    /// The run is already in a terminal state.
    ///
    /// Expected outcome of duplicate completion calls; benign, has no side
    /// effect, and is not escalated.
    #[error("run {run_id} is already terminal ({status})")]
    AlreadyTerminal {
        /// The run that was already terminal.
        run_id: RunId,
        /// The terminal status the run is in.
        status: RunStatus,
    },

    /// An unrecognized event severity level was supplied at the boundary.
    ///
    /// Rejected before the event reaches the log, so the append-only log
    /// stays free of garbage the inference engine would have to special-case.
    #[error("invalid event level: {value}")]
    InvalidLevel {
        /// The rejected level string.
        value: String,
    },

    /// Handing a run to the external worker failed.
    #[error("delegation failed: {message}")]
    Delegation {
        /// Description of the handoff failure.
        message: String,
    },

    /// A storage operation failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A serialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// An error from runway-core.
    #[error("core error: {0}")]
    Core(#[from] runway_core::Error),
}

impl Error {
    /// Creates a new storage error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new storage error with a source.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new delegation error.
    #[must_use]
    pub fn delegation(message: impl Into<String>) -> Self {
        Self::Delegation {
            message: message.into(),
        }
    }
}
