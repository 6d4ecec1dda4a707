use axum::extract::State;
use axum::Json;
use serde_json::json;

use crate::error::AppError;
use crate::state::SharedState;

/// What the connection-status indicator renders.
pub async fn status(
    State(state): State<SharedState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let queued = state.client.get_submission_queue().await?.len();
    Ok(Json(json!({
        "online": state.client.is_online(),
        "queued": queued,
    })))
}
