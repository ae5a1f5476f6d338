//! Run events and model artifact records.
//!
//! Events are the single source of truth for everything that happened during
//! a run. They are append-only: once written, never mutated or deleted;
//! corrections are expressed as new events.
//!
//! ## Ordering
//!
//! Events are ordered by `seq`, a per-run monotonically increasing sequence
//! assigned by the store at append time. That assignment order is the
//! authoritative causal order for status inference and for tailing. The
//! wall-clock `ts` can be supplied by an untrusted remote caller and is
//! informational only.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use runway_core::{ModelId, RunId};

use crate::error::Error;

/// Event severity level.
///
/// A closed set: unrecognized level strings are rejected at the ingestion
/// boundary so the log never has to carry garbage levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    /// Routine progress information.
    Info,
    /// Something unexpected that did not stop the run.
    Warn,
    /// A failure; error-level events accompany `failed` transitions.
    Error,
}

impl std::fmt::Display for EventLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl FromStr for EventLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(Error::InvalidLevel {
                value: s.to_string(),
            }),
        }
    }
}

/// One immutable, ordered log entry describing something that happened
/// during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunEvent {
    /// Per-run sequence number assigned at append time (1-indexed).
    ///
    /// This is the authoritative causal order; see the module docs. On the
    /// wire it is the event's `id`.
    #[serde(rename = "id")]
    pub seq: u64,
    /// The run this event belongs to.
    pub run_id: RunId,
    /// Wall-clock timestamp, possibly caller-supplied. Informational only.
    pub ts: DateTime<Utc>,
    /// Severity level.
    pub level: EventLevel,
    /// Short title; status inference matches on recognized title prefixes.
    pub title: String,
    /// Optional free-form detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// A registered model artifact record.
///
/// Created exactly once, at run completion, by the completion handler;
/// immutable thereafter. Traceability to the producing run is by naming
/// convention (names like `model-run-{id}` chosen by the worker), not by
/// foreign key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    /// Unique model identifier.
    pub id: ModelId,
    /// Model name as reported by the worker.
    pub name: String,
    /// Storage path/URI of the artifact.
    pub path: String,
    /// When the model was registered.
    pub created_at: DateTime<Utc>,
}

impl Model {
    /// Creates a new model record.
    #[must_use]
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: ModelId::generate(),
            name: name.into(),
            path: path.into(),
            created_at: Utc::now(),
        }
    }
}
