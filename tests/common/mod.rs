#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use reqwest::Client;
use serde_json::{Map, Value, json};

use formrelay::client::{SubmissionClient, SubmitOptions};
use formrelay::config::Config;
use formrelay::connectivity::ManualConnectivity;
use formrelay::gateway::{GatewayError, SubmissionGateway};
use formrelay::models::FormType;
use formrelay::queue::OfflineQueue;
use formrelay::store::MemoryStore;

/// A gateway whose answers are scripted per call. Once the script runs out it falls back to
/// accepting or failing every call.
pub struct ScriptedGateway {
    script: Mutex<VecDeque<Result<Value, GatewayError>>>,
    accept_by_default: bool,
    received: Mutex<Vec<(String, Map<String, Value>)>>,
}

impl ScriptedGateway {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self::new(true))
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self::new(false))
    }

    pub fn scripted(results: Vec<Result<Value, GatewayError>>, accept_by_default: bool) -> Arc<Self> {
        let gateway = Self::new(accept_by_default);
        *gateway.script.lock().unwrap() = results.into();
        Arc::new(gateway)
    }

    fn new(accept_by_default: bool) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            accept_by_default,
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    pub fn received(&self) -> Vec<(String, Map<String, Value>)> {
        self.received.lock().unwrap().clone()
    }

    /// Value of `field` in each received payload, in arrival order.
    pub fn received_field(&self, field: &str) -> Vec<Value> {
        self.received()
            .into_iter()
            .map(|(_, payload)| payload.get(field).cloned().unwrap_or(Value::Null))
            .collect()
    }
}

#[async_trait]
impl SubmissionGateway for ScriptedGateway {
    async fn deliver(
        &self,
        form_type: &FormType,
        payload: &Map<String, Value>,
    ) -> Result<Value, GatewayError> {
        self.received
            .lock()
            .unwrap()
            .push((form_type.to_string(), payload.clone()));

        if let Some(result) = self.script.lock().unwrap().pop_front() {
            return result;
        }

        if self.accept_by_default {
            Ok(json!({ "id": self.calls() }))
        } else {
            Err(GatewayError::Transport("connection refused".to_string()))
        }
    }
}

pub fn transport_error() -> GatewayError {
    GatewayError::Transport("connection refused".to_string())
}

/// Retry policy with a negligible delay so tests stay fast.
pub fn fast_options(retry_count: u32) -> SubmitOptions {
    SubmitOptions {
        retry_count,
        retry_delay: Duration::from_millis(1),
        ..SubmitOptions::default()
    }
}

pub fn payload(name: &str) -> Value {
    json!({ "name": name, "email": format!("{}@example.com", name.to_lowercase()) })
}

/// A client wired to an in-memory store, a scripted gateway and a manual connectivity switch.
pub struct Harness {
    pub client: Arc<SubmissionClient>,
    pub gateway: Arc<ScriptedGateway>,
    pub connectivity: Arc<ManualConnectivity>,
    pub store: Arc<MemoryStore>,
}

pub fn harness(gateway: Arc<ScriptedGateway>, online: bool) -> Harness {
    harness_with_store(gateway, online, Arc::new(MemoryStore::new()))
}

pub fn harness_with_store(
    gateway: Arc<ScriptedGateway>,
    online: bool,
    store: Arc<MemoryStore>,
) -> Harness {
    let connectivity = Arc::new(ManualConnectivity::new(online));
    let queue = Arc::new(OfflineQueue::new(store.clone()));
    let client = Arc::new(
        SubmissionClient::new(gateway.clone(), queue, connectivity.clone())
            .with_defaults(fast_options(3)),
    );

    Harness {
        client,
        gateway,
        connectivity,
        store,
    }
}

/// How the fake lead API answers.
pub const MODE_ACCEPT: u16 = 200;
pub const MODE_DECLINE: u16 = 0;

/// A stand-in for the lead/appointment API, recording every body it receives.
pub struct FakeGateway {
    pub addr: SocketAddr,
    mode: Arc<AtomicU16>,
    received: Arc<Mutex<Vec<(String, Value)>>>,
}

#[derive(Clone)]
struct FakeGatewayState {
    mode: Arc<AtomicU16>,
    received: Arc<Mutex<Vec<(String, Value)>>>,
}

impl FakeGateway {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// `MODE_ACCEPT`, `MODE_DECLINE` (200 with `success: false`) or any HTTP status to answer with.
    pub fn set_mode(&self, mode: u16) {
        self.mode.store(mode, Ordering::SeqCst);
    }

    pub fn received(&self) -> Vec<(String, Value)> {
        self.received.lock().unwrap().clone()
    }
}

pub async fn spawn_fake_gateway() -> FakeGateway {
    let state = FakeGatewayState {
        mode: Arc::new(AtomicU16::new(MODE_ACCEPT)),
        received: Arc::new(Mutex::new(Vec::new())),
    };

    let app = Router::new()
        .route("/api/health", get(|| async { "ok" }))
        .route("/api/{form_type}", post(fake_submit))
        .route("/api/leads/{form_type}", post(fake_submit))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind fake gateway");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Fake gateway failed");
    });

    FakeGateway {
        addr,
        mode: state.mode,
        received: state.received,
    }
}

async fn fake_submit(
    State(state): State<FakeGatewayState>,
    Path(form_type): Path<String>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.received.lock().unwrap().push((form_type, body.clone()));

    match state.mode.load(Ordering::SeqCst) {
        MODE_ACCEPT => (
            StatusCode::CREATED,
            Json(json!({ "success": true, "data": { "lead": body } })),
        ),
        MODE_DECLINE => (
            StatusCode::OK,
            Json(json!({ "success": false, "error": "Duplicate lead" })),
        ),
        status => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Json(json!({ "success": false, "error": "Database unavailable" })),
        ),
    }
}

/// An address nothing listens on.
pub async fn unreachable_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

pub fn test_config(gateway_url: &str) -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        gateway_url: gateway_url.to_string(),
        host: "127.0.0.1".parse().unwrap(),
        port: 0, // unused, we bind to random port
        max_body_size: 65_536,
        queue_slot: "offline_form_submission_queue".to_string(),
        queue_max_attempts: 20,
        retry_count: 3,
        retry_delay_ms: 1,
        backoff: formrelay::client::Backoff::Fixed,
        request_timeout_secs: 5,
        probe_url: format!("{gateway_url}/api/health"),
        probe_interval_secs: 1,
        form_routes: HashMap::new(),
        log_level: "warn".to_string(),
    }
}

/// A running relay bound to a random port.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn submit(&self, form_type: &str, data: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(&format!("/api/v1/forms/{form_type}")))
            .json(data)
            .send()
            .await
            .expect("submit request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn get(&self, path: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("get request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn post(&self, path: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .send()
            .await
            .expect("post request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn delete(&self, path: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .delete(self.url(path))
            .send()
            .await
            .expect("delete request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }
}

pub async fn spawn_app(config: Config, client: Arc<SubmissionClient>) -> TestApp {
    let app = formrelay::build_app(config, client);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    TestApp {
        addr,
        client: Client::new(),
    }
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
