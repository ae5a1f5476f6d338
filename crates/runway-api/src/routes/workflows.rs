//! Workflow routes.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use runway_flow::run::PipelineSpec;
use runway_flow::store::Store;

use crate::error::ApiError;
use crate::server::AppState;

/// Request body for creating a workflow.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateWorkflowBody {
    pub name: String,
    pub pipeline: Option<PipelineSpec>,
}

/// Creates a named workflow.
pub(crate) async fn create_workflow(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateWorkflowBody>,
) -> Result<impl IntoResponse, ApiError> {
    let workflow = state
        .store()
        .create_workflow(&body.name, body.pipeline)
        .await?;
    tracing::info!(workflow_id = %workflow.id, name = %workflow.name, "workflow created");
    Ok((StatusCode::CREATED, Json(workflow)))
}

/// Lists workflows, newest first.
pub(crate) async fn list_workflows(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let workflows = state.store().list_workflows().await?;
    Ok(Json(workflows))
}
