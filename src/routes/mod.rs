pub mod connection;
pub mod forms;
pub mod queue;

use axum::routing::{get, post};
use axum::Router;

use crate::state::SharedState;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        // Submissions
        .route("/api/v1/forms/{form_type}", post(forms::submit))
        // Offline queue
        .route(
            "/api/v1/queue",
            get(queue::list).delete(queue::clear),
        )
        .route("/api/v1/queue/drain", post(queue::drain))
        // Connection status
        .route("/api/v1/connection", get(connection::status))
}
