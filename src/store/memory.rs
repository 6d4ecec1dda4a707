use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::broadcast;

use crate::models::QueuedSubmission;

use super::{QueueChange, QueueStore, SlotEdit, StoreError, change_channel, decode, encode};

/// In-process slot storage. Share one instance behind an `Arc` to let several queues see the same slots.
pub struct MemoryStore {
    /// slot -> JSON-encoded entries
    slots: DashMap<String, String>,
    /// Per-slot byte limit; writes above it fail like an exhausted storage quota.
    quota_bytes: Option<usize>,
    changes: broadcast::Sender<QueueChange>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            quota_bytes: None,
            changes: change_channel(),
        }
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            quota_bytes: Some(quota_bytes),
            ..Self::new()
        }
    }

    /// Raw slot contents, as they would appear in browser storage.
    pub fn raw(&self, slot: &str) -> Option<String> {
        self.slots.get(slot).map(|v| v.value().clone())
    }

    fn encode_within_quota(&self, entries: &[QueuedSubmission]) -> Result<String, StoreError> {
        let raw = encode(entries)?;
        if let Some(limit) = self.quota_bytes {
            if raw.len() > limit {
                return Err(StoreError::QuotaExceeded {
                    limit,
                    requested: raw.len(),
                });
            }
        }
        Ok(raw)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueStore for MemoryStore {
    async fn load(&self, slot: &str) -> Result<Vec<QueuedSubmission>, StoreError> {
        match self.slots.get(slot) {
            Some(raw) => decode(raw.value()),
            None => Ok(Vec::new()),
        }
    }

    async fn update<'a>(&self, slot: &str, edit: SlotEdit<'a>) -> Result<usize, StoreError> {
        // The entry guard holds the shard lock until the edit is written back.
        let len = match self.slots.entry(slot.to_string()) {
            Entry::Occupied(mut occupied) => {
                let mut entries = decode(occupied.get())?;
                if !edit(&mut entries) {
                    return Ok(entries.len());
                }
                occupied.insert(self.encode_within_quota(&entries)?);
                entries.len()
            }
            Entry::Vacant(vacant) => {
                let mut entries = Vec::new();
                if !edit(&mut entries) {
                    return Ok(0);
                }
                vacant.insert(self.encode_within_quota(&entries)?);
                entries.len()
            }
        };

        let _ = self.changes.send(QueueChange {
            slot: slot.to_string(),
            len,
        });
        Ok(len)
    }

    fn subscribe(&self) -> broadcast::Receiver<QueueChange> {
        self.changes.subscribe()
    }
}
