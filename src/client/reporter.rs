use tokio::sync::watch;

use crate::models::{SubmissionProgress, SubmissionStatus};

/// Publishes progress snapshots for one submission.
///
/// Each attempt covers two half-steps of a 0-90 range (sending, then waiting), so the bar
/// only moves forward; completion jumps to 100.
pub(crate) struct ProgressReporter {
    tx: Option<watch::Sender<SubmissionProgress>>,
    track: bool,
    current: SubmissionProgress,
}

impl ProgressReporter {
    pub(crate) fn new(
        tx: Option<watch::Sender<SubmissionProgress>>,
        track: bool,
        max_attempts: u32,
    ) -> Self {
        Self {
            tx,
            track,
            current: SubmissionProgress::idle(max_attempts),
        }
    }

    pub(crate) fn submitting(&mut self, attempt: u32) {
        self.current.status = SubmissionStatus::Submitting;
        self.current.current_attempt = attempt;
        self.current.error = None;
        self.set_percent(step_percent(2 * attempt - 1, self.current.max_attempts));
        self.publish();
    }

    pub(crate) fn retrying(&mut self, attempt: u32, error: &str) {
        self.current.status = SubmissionStatus::Retrying;
        self.current.error = Some(error.to_string());
        self.set_percent(step_percent(2 * attempt, self.current.max_attempts));
        self.publish();
    }

    pub(crate) fn success(&mut self) {
        self.current.status = SubmissionStatus::Success;
        self.current.error = None;
        self.set_percent(100);
        self.publish();
    }

    pub(crate) fn queued(&mut self) {
        self.current.queued = true;
        self.success();
    }

    pub(crate) fn failed(&mut self, error: &str) {
        self.current.status = SubmissionStatus::Error;
        self.current.error = Some(error.to_string());
        self.publish();
    }

    fn set_percent(&mut self, percent: u8) {
        if self.track {
            self.current.progress = percent;
        }
    }

    fn publish(&self) {
        if let Some(tx) = &self.tx {
            tx.send_replace(self.current.clone());
        }
    }
}

fn step_percent(step: u32, max_attempts: u32) -> u8 {
    (45 * step / max_attempts.max(1)).min(100) as u8
}
