//! # runway-flow
//!
//! Run lifecycle orchestration for the Runway run-tracking service.
//!
//! This crate implements the orchestration domain:
//!
//! - **Run Registry**: Run and workflow records with a cached status
//!   projection
//! - **Event Log**: Append-only, per-run-ordered source of truth
//! - **Status Inference**: One pure function owning the transition policy
//! - **Delegation**: Best-effort handoff of queued runs to the external
//!   worker
//! - **Ingestion**: The idempotent boundary the worker calls back into
//! - **Tailing**: Cursor-based poll feed turning the log into a live
//!   subscription
//!
//! ## Core Concepts
//!
//! - **Run**: One execution of a (possibly ad-hoc) pipeline, performed
//!   out-of-process and tracked through `queued -> running ->
//!   {completed | failed}`
//! - **Event**: One immutable, ordered log entry; the per-run log is the
//!   single source of truth for everything that happened
//! - **Delegation**: The act of handing a queued run to the external worker
//!
//! ## Guarantees
//!
//! - **Sticky terminal states**: No event sequence can revert `completed`
//!   or `failed`
//! - **Exactly-once transitions** out of at-least-once delivery: per-run
//!   serialization plus CAS collapse duplicate callbacks into one state
//!   change
//! - **Replayable**: Folding a run's event log through the inference engine
//!   reconstructs its cached status
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use runway_flow::error::Result;
//! use runway_flow::event::EventLevel;
//! use runway_flow::ingest::{Ingestor, RunLocks};
//! use runway_flow::store::memory::InMemoryStore;
//! use runway_flow::store::Store;
//!
//! # async fn demo() -> Result<()> {
//! let store: Arc<InMemoryStore> = Arc::new(InMemoryStore::new());
//! let ingestor = Ingestor::new(store.clone(), Arc::new(RunLocks::new()));
//!
//! let run = store.create_run(None).await?;
//! ingestor
//!     .post_event(&run.id, EventLevel::Info, "Run started", None, None)
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod dispatch;
pub mod error;
pub mod event;
pub mod ingest;
pub mod metrics;
pub mod run;
pub mod status;
pub mod store;
pub mod tail;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::dispatch::{DelegationGateway, DelegationOutcome, HttpWorkerClient, WorkerClient};
    pub use crate::error::{Error, Result};
    pub use crate::event::{EventLevel, Model, RunEvent};
    pub use crate::ingest::{Ingestor, RunLocks};
    pub use crate::run::{JsonMap, PipelineSpec, Run, RunStatus, StepSpec, Workflow};
    pub use crate::store::{memory::InMemoryStore, CasResult, RunStats, Store};
    pub use crate::tail::{subscribe, FeedMessage, RunTailer, TailConfig};
}
