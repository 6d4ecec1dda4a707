pub mod http;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::models::FormType;

pub use http::HttpGateway;

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// The request never produced a response (DNS, refused connection, timeout).
    Transport(String),
    /// The gateway answered with a non-2xx status.
    Rejected { status: u16, message: String },
    /// 2xx response whose envelope reported `success: false`.
    Declined(String),
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayError::Transport(msg) => write!(f, "Network error: {msg}"),
            GatewayError::Rejected { status, message } => {
                write!(f, "Gateway rejected submission ({status}): {message}")
            }
            GatewayError::Declined(msg) => write!(f, "Gateway declined submission: {msg}"),
        }
    }
}

impl std::error::Error for GatewayError {}

/// Where submissions are actually persisted.
#[async_trait]
pub trait SubmissionGateway: Send + Sync {
    /// Deliver one payload. Returns the envelope's `data` on acceptance.
    async fn deliver(
        &self,
        form_type: &FormType,
        payload: &Map<String, Value>,
    ) -> Result<Value, GatewayError>;
}

/// Interpret a gateway response.
///
/// Accepted: a 2xx whose body is `{"success": true, "data": ...}`, or a 2xx body without a
/// `success` field (the whole body is then returned as data).
pub fn interpret_response(status: u16, body: &str) -> Result<Value, GatewayError> {
    let parsed: Option<Value> = serde_json::from_str(body).ok();

    if !(200..300).contains(&status) {
        let message = parsed
            .as_ref()
            .and_then(error_message)
            .unwrap_or_else(|| fallback_message(status, body));
        return Err(GatewayError::Rejected { status, message });
    }

    let Some(parsed) = parsed else {
        return Ok(if body.is_empty() {
            Value::Null
        } else {
            Value::String(body.to_string())
        });
    };

    match parsed.get("success").and_then(|s| s.as_bool()) {
        Some(true) => Ok(parsed.get("data").cloned().unwrap_or(Value::Null)),
        Some(false) => Err(GatewayError::Declined(
            error_message(&parsed).unwrap_or_else(|| "Unknown error".to_string()),
        )),
        None => Ok(parsed),
    }
}

fn error_message(body: &Value) -> Option<String> {
    ["error", "message"].iter().find_map(|key| match body.get(*key)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    })
}

fn fallback_message(status: u16, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        format!("HTTP {status}")
    } else {
        body.chars().take(1024).collect()
    }
}
