//! # runway-core
//!
//! Core abstractions shared across the Runway run-tracking service.
//!
//! This crate provides the foundational types used by every other component:
//!
//! - **Identifiers**: Strongly-typed IDs for runs, workflows, and models
//! - **Error Types**: Shared error definitions and result types
//! - **Observability**: Structured logging initialization and span helpers
//!
//! ## Crate Boundary
//!
//! `runway-core` is the only crate allowed to define shared primitives.
//! Domain logic lives in `runway-flow`; the HTTP boundary lives in
//! `runway-api`.
//!
//! ## Example
//!
//! ```rust
//! use runway_core::prelude::*;
//!
//! let run_id = RunId::generate();
//! let workflow_id = WorkflowId::generate();
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod id;
pub mod observability;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use runway_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::id::{ModelId, RunId, WorkflowId};
}

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use id::{ModelId, RunId, WorkflowId};
pub use observability::{init_logging, run_span, LogFormat};
