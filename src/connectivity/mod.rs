pub mod monitor;
pub mod probe;

use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::sync::broadcast;

pub use monitor::{ConnectionMonitor, ListenerHandle};
pub use probe::ProbeConnectivity;

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    Online,
    Offline,
}

impl Connectivity {
    pub fn from_online(online: bool) -> Self {
        if online {
            Connectivity::Online
        } else {
            Connectivity::Offline
        }
    }

    pub fn is_online(self) -> bool {
        self == Connectivity::Online
    }
}

/// Source of online/offline transitions, provided by the platform.
pub trait ConnectivityObserver: Send + Sync {
    /// Current state, usable before any transition has been observed.
    fn is_online(&self) -> bool;

    /// Transitions observed after subscribing. No event is sent when the state is unchanged.
    fn subscribe(&self) -> broadcast::Receiver<Connectivity>;
}

/// Current state plus a transition feed, shared by the observer implementations.
struct ConnectivityState {
    online: AtomicBool,
    events: broadcast::Sender<Connectivity>,
}

impl ConnectivityState {
    fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
            events: broadcast::channel(EVENT_CHANNEL_CAPACITY).0,
        }
    }

    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Returns true if this was a transition.
    fn set(&self, online: bool) -> bool {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous == online {
            return false;
        }
        let _ = self.events.send(Connectivity::from_online(online));
        true
    }

    fn subscribe(&self) -> broadcast::Receiver<Connectivity> {
        self.events.subscribe()
    }
}

/// Connectivity driven by whoever embeds the client, e.g. an OS network callback or a test.
pub struct ManualConnectivity {
    state: ConnectivityState,
}

impl ManualConnectivity {
    pub fn new(online: bool) -> Self {
        Self {
            state: ConnectivityState::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        if self.state.set(online) {
            tracing::info!("Connectivity changed: {:?}", Connectivity::from_online(online));
        }
    }
}

impl ConnectivityObserver for ManualConnectivity {
    fn is_online(&self) -> bool {
        self.state.is_online()
    }

    fn subscribe(&self) -> broadcast::Receiver<Connectivity> {
        self.state.subscribe()
    }
}
