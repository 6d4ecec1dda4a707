use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::gateway::SubmissionGateway;
use crate::models::{NewSubmission, QueuedSubmission};
use crate::store::{DEFAULT_QUEUE_SLOT, QueueStore, StoreError};

/// Entries are dropped once their failed attempts exceed this many.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 20;

/// Outcome of one drain cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub delivered: usize,
    pub dropped: usize,
    pub remaining: usize,
    /// True when the cycle stopped on a failed delivery.
    pub halted: bool,
}

/// FIFO queue of submissions owed to the gateway, persisted in a single store slot.
///
/// Every write is a single atomic slot update, so handles sharing a store never lose each
/// other's entries. Drains are serialized per handle only; two handles draining the same
/// slot at once may deliver an entry twice.
pub struct OfflineQueue {
    store: Arc<dyn QueueStore>,
    slot: String,
    max_attempts: u32,
    drain_lock: Mutex<()>,
}

impl OfflineQueue {
    pub fn new(store: Arc<dyn QueueStore>) -> Self {
        Self {
            store,
            slot: DEFAULT_QUEUE_SLOT.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            drain_lock: Mutex::new(()),
        }
    }

    pub fn with_slot(mut self, slot: impl Into<String>) -> Self {
        self.slot = slot.into();
        self
    }

    /// Failed attempts an entry may accumulate. It is dropped on the next failure after that.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn store(&self) -> &Arc<dyn QueueStore> {
        &self.store
    }

    pub fn slot(&self) -> &str {
        &self.slot
    }

    /// Append a submission. Identical payloads are never merged.
    pub async fn enqueue(&self, submission: NewSubmission) -> Result<QueuedSubmission, StoreError> {
        let entry = submission.into_queued();

        let queued = entry.clone();
        let pending = self
            .store
            .update(
                &self.slot,
                Box::new(move |entries: &mut Vec<QueuedSubmission>| {
                    entries.push(queued);
                    true
                }),
            )
            .await?;

        tracing::info!(
            "Queued {} submission {} ({pending} pending)",
            entry.form_type,
            entry.id
        );
        Ok(entry)
    }

    pub async fn get_queue(&self) -> Result<Vec<QueuedSubmission>, StoreError> {
        self.store.load(&self.slot).await
    }

    pub async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.get_queue().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len().await? == 0)
    }

    /// Deliver queued entries in insertion order, one at a time.
    ///
    /// Stops at the first failed delivery and leaves it (and everything behind it) queued.
    pub async fn process_queued_submissions(
        &self,
        gateway: &dyn SubmissionGateway,
    ) -> Result<DrainReport, StoreError> {
        let _drain = self.drain_lock.lock().await;
        let mut report = DrainReport::default();

        loop {
            let Some(head) = self.store.load(&self.slot).await?.into_iter().next() else {
                break;
            };

            tracing::debug!(
                "Delivering queued submission {} (form={}, attempt={})",
                head.id,
                head.form_type,
                head.attempts + 1
            );

            match gateway.deliver(&head.form_type, &head.payload).await {
                Ok(_) => {
                    self.remove(&head.id).await?;
                    report.delivered += 1;
                }
                Err(e) => {
                    tracing::warn!("Queued submission {} not delivered: {e}", head.id);
                    if self.record_failure(&head.id, &e.to_string()).await? {
                        report.dropped += 1;
                    }
                    report.halted = true;
                    break;
                }
            }
        }

        report.remaining = self.len().await?;
        if report.delivered > 0 || report.halted {
            tracing::info!(
                "Queue drain finished: {} delivered, {} dropped, {} remaining",
                report.delivered,
                report.dropped,
                report.remaining
            );
        }
        Ok(report)
    }

    /// Empty the queue unconditionally. Returns how many entries were discarded.
    pub async fn clear_submission_queue(&self) -> Result<usize, StoreError> {
        let mut cleared = 0;
        self.store
            .update(
                &self.slot,
                Box::new(|entries: &mut Vec<QueuedSubmission>| {
                    cleared = entries.len();
                    entries.clear();
                    cleared > 0
                }),
            )
            .await?;

        if cleared > 0 {
            tracing::warn!("Cleared {cleared} undelivered submission(s) from the offline queue");
        }
        Ok(cleared)
    }

    async fn remove(&self, id: &str) -> Result<(), StoreError> {
        self.store
            .update(
                &self.slot,
                Box::new(|entries: &mut Vec<QueuedSubmission>| {
                    let before = entries.len();
                    entries.retain(|e| e.id != id);
                    entries.len() != before
                }),
            )
            .await?;
        Ok(())
    }

    /// Count a failed attempt against an entry. Returns true if the entry went past the
    /// ceiling and was dropped.
    async fn record_failure(&self, id: &str, error: &str) -> Result<bool, StoreError> {
        let max_attempts = self.max_attempts;
        let mut dropped = false;

        self.store
            .update(
                &self.slot,
                Box::new(|entries: &mut Vec<QueuedSubmission>| {
                    let Some(pos) = entries.iter().position(|e| e.id == id) else {
                        return false;
                    };

                    let entry = &mut entries[pos];
                    entry.attempts += 1;
                    entry.last_error = Some(error.to_string());

                    if entry.attempts > max_attempts {
                        tracing::error!(
                            "Dropping queued {} submission {} after {} failed attempts: {error}",
                            entry.form_type,
                            entry.id,
                            entry.attempts
                        );
                        entries.remove(pos);
                        dropped = true;
                    }
                    true
                }),
            )
            .await?;

        Ok(dropped)
    }
}
