use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::client::SubmitOutcome;
use crate::error::AppError;
use crate::state::SharedState;

/// Submit a form payload. Queued submissions answer 202, failures after retries 502.
pub async fn submit(
    State(state): State<SharedState>,
    Path(form_type): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Response, AppError> {
    let outcome = state.client.submit(&form_type, payload).await?;

    let status = match &outcome {
        SubmitOutcome::Delivered { .. } => StatusCode::OK,
        SubmitOutcome::Queued { .. } => StatusCode::ACCEPTED,
        SubmitOutcome::Failed { .. } => StatusCode::BAD_GATEWAY,
    };

    Ok((status, Json(outcome)).into_response())
}
