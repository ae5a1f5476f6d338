//! REST route definitions.

mod insights;
mod models;
mod runs;
mod workflows;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;

use runway_core::RunId;

use crate::error::ApiError;
use crate::server::AppState;

/// Assembles the `/api` route tree.
pub(crate) fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/runs", post(runs::create_run).get(runs::list_runs))
        .route("/runs/:run_id", get(runs::get_run))
        // GET is the observer read; POST is the worker callback.
        .route(
            "/runs/:run_id/events",
            get(runs::list_run_events).post(runs::post_run_event),
        )
        .route("/runs/:run_id/metrics", put(runs::put_run_metrics))
        .route("/runs/:run_id/complete", post(runs::complete_run))
        .route(
            "/workflows",
            post(workflows::create_workflow).get(workflows::list_workflows),
        )
        .route("/models", get(models::list_models))
        .route("/insights", get(insights::get_insights))
}

/// Parses a path segment into a [`RunId`], mapping failures to 400.
pub(crate) fn parse_run_id(raw: &str) -> Result<RunId, ApiError> {
    raw.parse::<RunId>().map_err(ApiError::from)
}
