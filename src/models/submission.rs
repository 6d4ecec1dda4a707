use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

static FORM_TYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap());

/// Tag selecting the gateway route for a submission, e.g. `free-class` or `contact`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FormType(String);

impl FormType {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err("Form type must not be empty".to_string());
        }
        if !FORM_TYPE_RE.is_match(raw) {
            return Err(format!("Invalid form type: {raw}"));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for FormType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        FormType::parse(&value)
    }
}

impl From<FormType> for String {
    fn from(value: FormType) -> Self {
        value.0
    }
}

/// An entry of the persisted offline queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedSubmission {
    pub id: String,
    pub form_type: FormType,
    pub payload: Map<String, Value>,
    pub enqueued_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Input to `OfflineQueue::enqueue`. Missing `id` and `enqueued_at` are filled in on enqueue.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSubmission {
    pub id: Option<String>,
    pub form_type: FormType,
    pub payload: Map<String, Value>,
    pub enqueued_at: Option<DateTime<Utc>>,
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl NewSubmission {
    pub fn new(form_type: FormType, payload: Map<String, Value>) -> Self {
        Self {
            id: None,
            form_type,
            payload,
            enqueued_at: None,
            attempts: 0,
            last_error: None,
        }
    }

    pub fn with_attempts(mut self, attempts: u32, last_error: Option<String>) -> Self {
        self.attempts = attempts;
        self.last_error = last_error;
        self
    }

    pub(crate) fn into_queued(self) -> QueuedSubmission {
        QueuedSubmission {
            id: self
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| Uuid::now_v7().to_string()),
            form_type: self.form_type,
            payload: self.payload,
            enqueued_at: self.enqueued_at.unwrap_or_else(Utc::now),
            attempts: self.attempts,
            last_error: self.last_error,
        }
    }
}
