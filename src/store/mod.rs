pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::models::QueuedSubmission;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Slot name the queue is persisted under unless configured otherwise.
pub const DEFAULT_QUEUE_SLOT: &str = "offline_form_submission_queue";

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Emitted after every write to a slot so other handles sharing the storage can refresh counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueChange {
    pub slot: String,
    pub len: usize,
}

#[derive(Debug)]
pub enum StoreError {
    Database(sqlx::Error),
    Migration(sqlx::migrate::MigrateError),
    Serialization(serde_json::Error),
    QuotaExceeded { limit: usize, requested: usize },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Database(err) => write!(f, "Queue storage error: {err}"),
            StoreError::Migration(err) => write!(f, "Queue storage migration failed: {err}"),
            StoreError::Serialization(err) => write!(f, "Queue slot is not valid JSON: {err}"),
            StoreError::QuotaExceeded { limit, requested } => write!(
                f,
                "Queue storage quota exceeded ({requested} bytes requested, limit {limit})"
            ),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err)
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::Migration(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err)
    }
}

/// Edit applied to a slot's entries inside [`QueueStore::update`]. Returns false when it left
/// the entries untouched, in which case nothing is written.
pub type SlotEdit<'a> = Box<dyn FnOnce(&mut Vec<QueuedSubmission>) -> bool + Send + 'a>;

/// Durable named slots holding the JSON-encoded queue.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Read a slot. A slot that was never written reads as empty.
    async fn load(&self, slot: &str) -> Result<Vec<QueuedSubmission>, StoreError>;

    /// Read, edit and write back a slot as one atomic step. No other writer to the same
    /// storage can interleave with it. Returns the slot length afterwards.
    async fn update<'a>(&self, slot: &str, edit: SlotEdit<'a>) -> Result<usize, StoreError>;

    /// Subscribe to slot writes. Every writer sharing the underlying storage is reported.
    fn subscribe(&self) -> broadcast::Receiver<QueueChange>;
}

fn change_channel() -> broadcast::Sender<QueueChange> {
    broadcast::channel(CHANGE_CHANNEL_CAPACITY).0
}

fn encode(entries: &[QueuedSubmission]) -> Result<String, StoreError> {
    Ok(serde_json::to_string(entries)?)
}

fn decode(raw: &str) -> Result<Vec<QueuedSubmission>, StoreError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(raw)?)
}
