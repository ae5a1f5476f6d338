//! Aggregate insights for dashboards.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use runway_flow::store::Store;

use crate::error::ApiError;
use crate::routes::runs::RunSummary;
use crate::server::AppState;

/// Number of recent runs included in the insights payload.
const LATEST_RUNS_LIMIT: usize = 10;

/// Aggregate counts by status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Totals {
    pub runs: usize,
    pub models: usize,
    pub queued: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Insights response: totals plus the most recent runs.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InsightsResponse {
    pub totals: Totals,
    pub latest_runs: Vec<RunSummary>,
}

/// Returns status totals and the latest runs.
pub(crate) async fn get_insights(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store();
    let stats = store.stats().await?;
    let latest_runs: Vec<RunSummary> = store
        .list_runs()
        .await?
        .iter()
        .take(LATEST_RUNS_LIMIT)
        .map(RunSummary::from)
        .collect();

    Ok(Json(InsightsResponse {
        totals: Totals {
            runs: stats.runs,
            models: stats.models,
            queued: stats.queued,
            running: stats.running,
            completed: stats.completed,
            failed: stats.failed,
        },
        latest_runs,
    }))
}
