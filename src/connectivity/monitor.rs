use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::store::QueueStore;

use super::{Connectivity, ConnectivityObserver};

/// Bridges connectivity transitions and queue-slot changes to caller callbacks.
///
/// Draining the queue when the connection comes back is up to the `on_online` callback.
#[derive(Clone)]
pub struct ConnectionMonitor {
    observer: Arc<dyn ConnectivityObserver>,
    queue: Option<(Arc<dyn QueueStore>, String)>,
}

/// A running listener. Dropping the handle unregisters it.
#[must_use = "the listener stops when its handle is dropped"]
pub struct ListenerHandle {
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub fn remove(self) {}

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl ConnectionMonitor {
    pub fn new(observer: Arc<dyn ConnectivityObserver>) -> Self {
        Self {
            observer,
            queue: None,
        }
    }

    /// Also report writes to `slot` of `store`, including ones made by other queue handles.
    pub fn watch_queue(mut self, store: Arc<dyn QueueStore>, slot: impl Into<String>) -> Self {
        self.queue = Some((store, slot.into()));
        self
    }

    pub fn is_online(&self) -> bool {
        self.observer.is_online()
    }

    /// Run `on_online`/`on_offline` for every transition, in the order they happen.
    ///
    /// There is no debounce: a quick flap runs both callbacks.
    pub fn setup_connection_listeners<On, OnFut, Off, OffFut>(
        &self,
        on_online: On,
        on_offline: Off,
    ) -> ListenerHandle
    where
        On: Fn() -> OnFut + Send + Sync + 'static,
        OnFut: Future<Output = ()> + Send + 'static,
        Off: Fn() -> OffFut + Send + Sync + 'static,
        OffFut: Future<Output = ()> + Send + 'static,
    {
        let mut events = self.observer.subscribe();
        let observer = Arc::clone(&self.observer);

        let task = tokio::spawn(async move {
            loop {
                let state = match events.recv().await {
                    Ok(state) => state,
                    Err(RecvError::Lagged(skipped)) => {
                        // Missed transitions collapse into the current state
                        tracing::warn!("Connection listener skipped {skipped} transition(s)");
                        Connectivity::from_online(observer.is_online())
                    }
                    Err(RecvError::Closed) => break,
                };

                tracing::debug!("Connection listener observed {state:?}");
                match state {
                    Connectivity::Online => on_online().await,
                    Connectivity::Offline => on_offline().await,
                }
            }
        });

        ListenerHandle { task }
    }

    /// Call `on_change` with the new queue length after every write to the watched slot.
    ///
    /// Returns `None` when no queue is being watched.
    pub fn setup_queue_listener<F>(&self, on_change: F) -> Option<ListenerHandle>
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        let (store, slot) = self.queue.as_ref()?;
        let mut changes = store.subscribe();
        let store = Arc::clone(store);
        let slot = slot.clone();

        let task = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) if change.slot == slot => on_change(change.len),
                    Ok(_) => {}
                    Err(RecvError::Lagged(_)) => match store.load(&slot).await {
                        Ok(entries) => on_change(entries.len()),
                        Err(e) => tracing::error!("Failed to refresh queue length: {e}"),
                    },
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Some(ListenerHandle { task })
    }
}
