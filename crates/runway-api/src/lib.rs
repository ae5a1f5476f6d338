//! # runway-api
//!
//! HTTP boundary for the Runway run-tracking service.
//!
//! Exposes:
//!
//! - REST routes under `/api`: run lifecycle, workflow and model records,
//!   aggregate insights, and the worker callback surface
//! - A per-run WebSocket feed under `/ws/runs/{run_id}` with
//!   snapshot-then-incremental semantics
//! - `/health` and `/ready` probes
//!
//! All domain behavior lives in [`runway_flow`]; this crate does routing,
//! (de)serialization, configuration, and error mapping only.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
mod routes;
pub mod server;
mod ws;

pub use config::Config;
pub use error::{ApiError, ApiErrorBody, ApiResult};
pub use server::{AppState, Server};
