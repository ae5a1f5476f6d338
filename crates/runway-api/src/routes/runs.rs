//! Run lifecycle routes: creation, reads, and the worker callback surface.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use runway_core::RunId;
use runway_flow::event::{EventLevel, Model};
use runway_flow::run::{JsonMap, PipelineSpec, Run, RunStatus};
use runway_flow::store::Store;

use super::parse_run_id;
use crate::error::ApiError;
use crate::server::AppState;

/// Request body for creating a run.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateRunBody {
    /// Optional ad-hoc pipeline; creates a workflow when present.
    pub pipeline: Option<PipelineSpec>,
    /// Display name for the created workflow.
    pub name: Option<String>,
}

/// Response body for run creation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateRunResponse {
    pub run_id: RunId,
}

/// Compact run representation for listings.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RunSummary {
    pub id: RunId,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Run> for RunSummary {
    fn from(run: &Run) -> Self {
        Self {
            id: run.id,
            status: run.status,
            created_at: run.created_at,
            updated_at: run.updated_at,
        }
    }
}

/// Creates a run, optionally under a freshly created workflow, appends the
/// canonical "Run queued" event, and hands the run to the delegation
/// gateway in the background.
///
/// The creator never waits on the worker: delegation failure reports
/// through the run record (terminal `failed` plus a trailing error event),
/// not through this response.
pub(crate) async fn create_run(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateRunBody>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store();

    let workflow_id = match body.pipeline {
        Some(spec) => {
            let name = body.name.as_deref().unwrap_or("ad-hoc");
            let workflow = store.create_workflow(name, Some(spec)).await?;
            Some(workflow.id)
        }
        None => None,
    };

    let run = store.create_run(workflow_id).await?;
    store
        .append_event(
            &run.id,
            EventLevel::Info,
            "Run queued",
            Some("Awaiting worker pickup"),
            None,
        )
        .await?;

    tracing::info!(run_id = %run.id, workflow_id = ?workflow_id, "run created");

    if let Some(gateway) = state.gateway() {
        let run_id = run.id;
        tokio::spawn(async move {
            if let Err(err) = gateway.delegate(&run_id).await {
                tracing::error!(run_id = %run_id, error = %err, "delegation task failed");
            }
        });
    } else {
        tracing::debug!(run_id = %run.id, "no worker configured; run stays queued");
    }

    Ok((StatusCode::CREATED, Json(CreateRunResponse { run_id: run.id })))
}

/// Lists runs, newest first.
pub(crate) async fn list_runs(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let runs = state.store().list_runs().await?;
    let summaries: Vec<RunSummary> = runs.iter().map(RunSummary::from).collect();
    Ok(Json(summaries))
}

/// Returns one run: `{id, status, metrics, createdAt, updatedAt, workflowId?}`.
pub(crate) async fn get_run(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let run_id = parse_run_id(&run_id)?;
    let run = state
        .store()
        .get_run(&run_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("run not found: {run_id}")))?;
    Ok(Json(run))
}

/// Returns the run's full event history in log order.
pub(crate) async fn list_run_events(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let run_id = parse_run_id(&run_id)?;
    let store = state.store();

    // Distinguish "no events yet" from "no such run" for the REST read.
    if store.get_run(&run_id).await?.is_none() {
        return Err(ApiError::not_found(format!("run not found: {run_id}")));
    }

    let events = store.list_events(&run_id).await?;
    Ok(Json(events))
}

/// Request body for the worker's event callback.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PostEventBody {
    /// Severity level string; unrecognized values are rejected.
    pub level: String,
    pub title: String,
    pub detail: Option<String>,
    /// Caller-supplied timestamp; informational only.
    pub ts: Option<DateTime<Utc>>,
}

/// Worker callback: appends an event and runs status inference.
///
/// Safe to call repeatedly; duplicate or out-of-order titles are not
/// errors, and events on terminal runs are appended without changing
/// status.
pub(crate) async fn post_run_event(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
    Json(body): Json<PostEventBody>,
) -> Result<impl IntoResponse, ApiError> {
    let run_id = parse_run_id(&run_id)?;
    let level: EventLevel = body.level.parse().map_err(ApiError::from)?;

    let event = state
        .ingestor()
        .post_event(&run_id, level, &body.title, body.detail.as_deref(), body.ts)
        .await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// Request body for the worker's metrics callback.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PutMetricsBody {
    pub metrics: JsonMap,
}

/// Worker callback: wholesale-replaces the run's metrics snapshot.
pub(crate) async fn put_run_metrics(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
    Json(body): Json<PutMetricsBody>,
) -> Result<impl IntoResponse, ApiError> {
    let run_id = parse_run_id(&run_id)?;
    let run = state.ingestor().put_metrics(&run_id, body.metrics).await?;
    Ok(Json(run))
}

/// Request body for the worker's completion callback.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CompleteRunBody {
    pub model_name: String,
    pub model_path: String,
}

/// Response body for run completion.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CompleteRunResponse {
    pub run: Run,
    pub model: Model,
}

/// Worker callback: declares the run complete and registers its model.
///
/// Calling this more than once is safe: the retry fails with a benign
/// `ALREADY_TERMINAL` conflict and creates no second model record.
pub(crate) async fn complete_run(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
    Json(body): Json<CompleteRunBody>,
) -> Result<impl IntoResponse, ApiError> {
    let run_id = parse_run_id(&run_id)?;
    let (run, model) = state
        .ingestor()
        .complete_run(&run_id, &body.model_name, &body.model_path)
        .await?;
    Ok(Json(CompleteRunResponse { run, model }))
}
