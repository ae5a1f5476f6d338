//! Model artifact record routes.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use runway_flow::store::Store;

use crate::error::ApiError;
use crate::server::AppState;

/// Lists registered models, newest first.
pub(crate) async fn list_models(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let models = state.store().list_models().await?;
    Ok(Json(models))
}
