use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    #[default]
    Idle,
    Submitting,
    Success,
    Error,
    Retrying,
}

/// Snapshot of a submission in flight, published to whoever renders the status panel.
///
/// `progress` is an estimate driven by the attempt counter, not by bytes sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionProgress {
    pub status: SubmissionStatus,
    pub progress: u8,
    pub current_attempt: u32,
    pub max_attempts: u32,
    pub error: Option<String>,
    /// Set when the submission ended up in the offline queue.
    #[serde(default)]
    pub queued: bool,
}

impl SubmissionProgress {
    pub fn idle(max_attempts: u32) -> Self {
        Self {
            status: SubmissionStatus::Idle,
            progress: 0,
            current_attempt: 0,
            max_attempts,
            error: None,
            queued: false,
        }
    }

    /// A fresh progress channel for one submission.
    pub fn channel(max_attempts: u32) -> (watch::Sender<Self>, watch::Receiver<Self>) {
        watch::channel(Self::idle(max_attempts))
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self.status,
            SubmissionStatus::Success | SubmissionStatus::Error
        )
    }
}
