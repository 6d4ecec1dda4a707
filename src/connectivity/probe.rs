use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};

use super::{Connectivity, ConnectivityObserver, ConnectivityState};

/// Polls a health URL and treats any HTTP response below 500 as being online.
///
/// Starts out online, matching what a freshly loaded page assumes before the first signal.
pub struct ProbeConnectivity {
    client: reqwest::Client,
    url: String,
    interval: Duration,
    state: ConnectivityState,
}

impl ProbeConnectivity {
    pub fn new(url: impl Into<String>, interval: Duration, timeout: Duration) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| format!("Failed to build probe client: {e}"))?;

        Ok(Self {
            client,
            url: url.into(),
            interval,
            state: ConnectivityState::new(true),
        })
    }

    /// Run one probe and record the result.
    pub async fn probe_once(&self) -> Connectivity {
        let online = match self.client.get(&self.url).send().await {
            Ok(resp) => !resp.status().is_server_error(),
            Err(e) => {
                tracing::debug!("Connectivity probe to {} failed: {e}", self.url);
                false
            }
        };

        if self.state.set(online) {
            tracing::info!(
                "Connectivity changed: {:?} (probe {})",
                Connectivity::from_online(online),
                self.url
            );
        }
        Connectivity::from_online(online)
    }

    /// Probe on a fixed interval until shutdown is signaled.
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            tracing::debug!("Connectivity probe started ({}s interval)", self.interval.as_secs());

            loop {
                if *shutdown.borrow() {
                    break;
                }

                self.probe_once().await;

                tokio::select! {
                    _ = tokio::time::sleep(self.interval) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }

            tracing::debug!("Connectivity probe stopped");
        })
    }
}

impl ConnectivityObserver for ProbeConnectivity {
    fn is_online(&self) -> bool {
        self.state.is_online()
    }

    fn subscribe(&self) -> broadcast::Receiver<Connectivity> {
        self.state.subscribe()
    }
}
