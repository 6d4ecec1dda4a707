pub mod options;
mod reporter;

use std::future::Future;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use serde_json::{Value, json};
use tokio::sync::watch;

use crate::connectivity::{ConnectionMonitor, ConnectivityObserver, ListenerHandle};
use crate::gateway::SubmissionGateway;
use crate::models::{FormType, NewSubmission, QueuedSubmission, SubmissionProgress};
use crate::queue::{DrainReport, OfflineQueue};
use crate::store::StoreError;

pub use options::{Backoff, SubmitOptions};
use reporter::ProgressReporter;

/// How a submission ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The gateway accepted it.
    Delivered { data: Value },
    /// Retries ran out while offline; saved and sent automatically once back online.
    Queued { entry_id: String },
    /// Retries ran out while online. The caller should offer a manual retry.
    Failed { error: String },
}

impl SubmitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SubmitOutcome::Delivered { .. })
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, SubmitOutcome::Queued { .. })
    }

    /// The `{success, data | error}` envelope form components expect.
    pub fn to_envelope(&self) -> Value {
        match self {
            SubmitOutcome::Delivered { data } => json!({ "success": true, "data": data }),
            SubmitOutcome::Queued { entry_id } => json!({
                "success": false,
                "data": { "queued": true, "id": entry_id },
            }),
            SubmitOutcome::Failed { error } => json!({ "success": false, "error": error }),
        }
    }
}

impl Serialize for SubmitOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_envelope().serialize(serializer)
    }
}

#[derive(Debug)]
pub enum SubmitError {
    /// Bad form type or non-object payload; nothing was sent.
    InvalidRequest(String),
    /// Delivery failed offline and the submission could not be persisted either.
    Storage(StoreError),
}

impl std::fmt::Display for SubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitError::InvalidRequest(msg) => write!(f, "Invalid submission: {msg}"),
            SubmitError::Storage(err) => write!(f, "Submission could not be saved: {err}"),
        }
    }
}

impl std::error::Error for SubmitError {}

impl From<StoreError> for SubmitError {
    fn from(err: StoreError) -> Self {
        SubmitError::Storage(err)
    }
}

/// Sends form submissions, retrying and falling back to the offline queue.
pub struct SubmissionClient {
    gateway: Arc<dyn SubmissionGateway>,
    queue: Arc<OfflineQueue>,
    connectivity: Arc<dyn ConnectivityObserver>,
    defaults: SubmitOptions,
}

impl SubmissionClient {
    pub fn new(
        gateway: Arc<dyn SubmissionGateway>,
        queue: Arc<OfflineQueue>,
        connectivity: Arc<dyn ConnectivityObserver>,
    ) -> Self {
        Self {
            gateway,
            queue,
            connectivity,
            defaults: SubmitOptions::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: SubmitOptions) -> Self {
        self.defaults = defaults;
        self
    }

    /// Submit with the client's default options and no progress reporting.
    pub async fn submit(&self, form_type: &str, payload: Value) -> Result<SubmitOutcome, SubmitError> {
        let options = self.defaults.clone();
        self.submit_with_progress(form_type, payload, &options, None)
            .await
    }

    /// Submit, publishing a progress snapshot on every attempt and wait.
    ///
    /// Only `Err` for invalid input or when an offline submission cannot be persisted.
    pub async fn submit_with_progress(
        &self,
        form_type: &str,
        payload: Value,
        options: &SubmitOptions,
        progress: Option<watch::Sender<SubmissionProgress>>,
    ) -> Result<SubmitOutcome, SubmitError> {
        let form_type = FormType::parse(form_type).map_err(SubmitError::InvalidRequest)?;
        let Value::Object(payload) = payload else {
            return Err(SubmitError::InvalidRequest(
                "Payload must be a JSON object".to_string(),
            ));
        };

        let max_attempts = options.attempts();
        let mut reporter = ProgressReporter::new(progress, options.track_progress, max_attempts);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            reporter.submitting(attempt);

            match self.gateway.deliver(&form_type, &payload).await {
                Ok(data) => {
                    tracing::info!("Delivered {form_type} submission on attempt {attempt}");
                    reporter.success();
                    return Ok(SubmitOutcome::Delivered { data });
                }
                Err(e) => {
                    tracing::warn!(
                        "Attempt {attempt}/{max_attempts} for {form_type} submission failed: {e}"
                    );
                    last_error = e.to_string();

                    if attempt < max_attempts {
                        reporter.retrying(attempt, &last_error);
                        tokio::time::sleep(options.delay_after(attempt)).await;
                    }
                }
            }
        }

        if self.connectivity.is_online() {
            reporter.failed(&last_error);
            return Ok(SubmitOutcome::Failed { error: last_error });
        }

        let pending = NewSubmission::new(form_type, payload)
            .with_attempts(max_attempts, Some(last_error));
        match self.queue.enqueue(pending).await {
            Ok(entry) => {
                reporter.queued();
                Ok(SubmitOutcome::Queued { entry_id: entry.id })
            }
            Err(e) => {
                tracing::error!("Failed to queue offline submission: {e}");
                reporter.failed(&e.to_string());
                Err(SubmitError::Storage(e))
            }
        }
    }

    pub async fn get_submission_queue(&self) -> Result<Vec<QueuedSubmission>, StoreError> {
        self.queue.get_queue().await
    }

    pub async fn process_queued_submissions(&self) -> Result<DrainReport, StoreError> {
        self.queue
            .process_queued_submissions(self.gateway.as_ref())
            .await
    }

    pub async fn clear_submission_queue(&self) -> Result<usize, StoreError> {
        self.queue.clear_submission_queue().await
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    /// A monitor over this client's connectivity source and queue slot.
    pub fn monitor(&self) -> ConnectionMonitor {
        ConnectionMonitor::new(Arc::clone(&self.connectivity))
            .watch_queue(Arc::clone(self.queue.store()), self.queue.slot())
    }

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
        self.monitor()
            .setup_connection_listeners(on_online, on_offline)
    }

    /// Drain the queue every time the connection comes back.
    pub fn start_auto_drain(self: &Arc<Self>) -> ListenerHandle {
        let client = Arc::clone(self);
        self.setup_connection_listeners(
            move || {
                let client = Arc::clone(&client);
                async move {
                    tracing::info!("Back online, draining offline queue");
                    if let Err(e) = client.process_queued_submissions().await {
                        tracing::error!("Offline queue drain failed: {e}");
                    }
                }
            },
            || async {
                tracing::info!("Connection lost, new submissions will be queued");
            },
        )
    }
}
