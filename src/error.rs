use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::client::SubmitError;
use crate::store::StoreError;

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Storage(StoreError),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::BadRequest(msg) => write!(f, "Bad Request: {msg}"),
            AppError::Storage(err) => write!(f, "Storage Error: {err}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Storage(StoreError::QuotaExceeded { .. }) => {
                tracing::error!("Queue storage full: {self}");
                (
                    StatusCode::INSUFFICIENT_STORAGE,
                    "Submission could not be saved: storage is full".to_string(),
                )
            }
            AppError::Storage(err) => {
                tracing::error!("Queue storage error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Submission queue is unavailable".to_string(),
                )
            }
        };

        let body = json!({ "success": false, "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Storage(err)
    }
}

impl From<SubmitError> for AppError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::InvalidRequest(msg) => AppError::BadRequest(msg),
            SubmitError::Storage(err) => AppError::Storage(err),
        }
    }
}
