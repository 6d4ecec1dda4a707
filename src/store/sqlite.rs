use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::models::QueuedSubmission;

use super::{QueueChange, QueueStore, SlotEdit, StoreError, change_channel, decode, encode};

/// How often the database is checked for writes made by other store instances.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Slot storage backed by a SQLite database, surviving process restarts.
///
/// Several instances (or processes) may open the same database. Each update runs in its own
/// write transaction, and each instance polls slot versions so its subscribers also hear
/// about writes made elsewhere.
pub struct SqliteStore {
    pool: SqlitePool,
    changes: broadcast::Sender<QueueChange>,
    /// slot -> highest version this instance has reported
    versions: Arc<DashMap<String, i64>>,
    poller: Option<JoinHandle<()>>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `url` and apply migrations.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::debug!("Queue storage migrations applied");

        let versions = Arc::new(DashMap::new());
        for (slot, version) in current_versions(&pool).await? {
            versions.insert(slot, version);
        }

        let mut store = Self {
            pool,
            changes: change_channel(),
            versions,
            poller: None,
        };
        store.start_polling(DEFAULT_POLL_INTERVAL);
        Ok(store)
    }

    /// Check for writes from other instances every `interval` instead of the default.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.start_polling(interval);
        self
    }

    fn start_polling(&mut self, interval: Duration) {
        if let Some(previous) = self.poller.take() {
            previous.abort();
        }
        self.poller = Some(tokio::spawn(watch_external_writes(
            self.pool.clone(),
            self.changes.clone(),
            Arc::clone(&self.versions),
            interval,
        )));
    }

    async fn edit_slot(
        conn: &mut SqliteConnection,
        slot: &str,
        edit: SlotEdit<'_>,
    ) -> Result<(usize, Option<i64>), StoreError> {
        let raw = sqlx::query_scalar::<_, String>("SELECT value FROM queue_slots WHERE slot = ?1")
            .bind(slot)
            .fetch_optional(&mut *conn)
            .await?;

        let mut entries = match raw {
            Some(raw) => decode(&raw)?,
            None => Vec::new(),
        };
        if !edit(&mut entries) {
            return Ok((entries.len(), None));
        }

        let version = sqlx::query_scalar::<_, i64>(
            "INSERT INTO queue_slots (slot, value, version, updated_at) VALUES (?1, ?2, 1, ?3)
             ON CONFLICT(slot) DO UPDATE SET value = excluded.value,
                 version = queue_slots.version + 1, updated_at = excluded.updated_at
             RETURNING version",
        )
        .bind(slot)
        .bind(encode(&entries)?)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok((entries.len(), Some(version)))
    }
}

impl Drop for SqliteStore {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
    }
}

#[async_trait]
impl QueueStore for SqliteStore {
    async fn load(&self, slot: &str) -> Result<Vec<QueuedSubmission>, StoreError> {
        let raw = sqlx::query_scalar::<_, String>("SELECT value FROM queue_slots WHERE slot = ?1")
            .bind(slot)
            .fetch_optional(&self.pool)
            .await?;

        match raw {
            Some(raw) => decode(&raw),
            None => Ok(Vec::new()),
        }
    }

    async fn update<'a>(&self, slot: &str, edit: SlotEdit<'a>) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Writing first takes the database write lock, so concurrent writers wait for this
        // transaction instead of reading a slot that is about to change.
        sqlx::query(
            "INSERT OR IGNORE INTO queue_slots (slot, value, version, updated_at) VALUES (?1, '[]', 0, ?2)",
        )
        .bind(slot)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        let (len, version) = Self::edit_slot(&mut *tx, slot, edit).await?;
        let Some(version) = version else {
            tx.rollback().await?;
            return Ok(len);
        };
        tx.commit().await?;

        if record_version(&self.versions, slot, version) {
            let _ = self.changes.send(QueueChange {
                slot: slot.to_string(),
                len,
            });
        }
        Ok(len)
    }

    fn subscribe(&self) -> broadcast::Receiver<QueueChange> {
        self.changes.subscribe()
    }
}

async fn current_versions(pool: &SqlitePool) -> Result<Vec<(String, i64)>, StoreError> {
    Ok(
        sqlx::query_as::<_, (String, i64)>("SELECT slot, version FROM queue_slots")
            .fetch_all(pool)
            .await?,
    )
}

/// Remember `version` for `slot`. Returns false if an equal or newer version was already seen.
fn record_version(versions: &DashMap<String, i64>, slot: &str, version: i64) -> bool {
    let mut seen = versions.entry(slot.to_string()).or_insert(i64::MIN);
    if *seen >= version {
        return false;
    }
    *seen = version;
    true
}

async fn watch_external_writes(
    pool: SqlitePool,
    changes: broadcast::Sender<QueueChange>,
    versions: Arc<DashMap<String, i64>>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;

        let rows = match sqlx::query_as::<_, (String, i64, String)>(
            "SELECT slot, version, value FROM queue_slots",
        )
        .fetch_all(&pool)
        .await
        {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!("Failed to poll queue slots for changes: {e}");
                continue;
            }
        };

        for (slot, version, value) in rows {
            if !record_version(&versions, &slot, version) {
                continue;
            }
            match decode(&value) {
                Ok(entries) => {
                    tracing::debug!("Slot {slot} changed elsewhere ({} entries)", entries.len());
                    let _ = changes.send(QueueChange {
                        slot,
                        len: entries.len(),
                    });
                }
                Err(e) => tracing::warn!("Slot {slot} changed elsewhere but is unreadable: {e}"),
            }
        }
    }
}
