use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;
use crate::queue::DrainReport;
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct ClearParams {
    pub confirm: Option<bool>,
}

pub async fn list(
    State(state): State<SharedState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let submissions = state.client.get_submission_queue().await?;
    Ok(Json(json!({
        "count": submissions.len(),
        "submissions": submissions,
    })))
}

pub async fn drain(State(state): State<SharedState>) -> Result<Json<DrainReport>, AppError> {
    let report = state.client.process_queued_submissions().await?;
    Ok(Json(report))
}

/// Discard every queued submission. Requires `?confirm=true`.
pub async fn clear(
    State(state): State<SharedState>,
    Query(params): Query<ClearParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    if params.confirm != Some(true) {
        return Err(AppError::BadRequest(
            "Clearing the queue discards undelivered submissions; pass confirm=true".to_string(),
        ));
    }

    let cleared = state.client.clear_submission_queue().await?;
    Ok(Json(json!({ "cleared": cleared })))
}
