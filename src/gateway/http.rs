use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::models::FormType;

use super::{GatewayError, SubmissionGateway, interpret_response};

/// Delivers submissions to the lead/appointment API over HTTP.
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    /// form type -> path, overriding the default `/api/{form_type}`
    routes: HashMap<String, String>,
}

impl HttpGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            routes: HashMap::new(),
        })
    }

    pub fn with_routes(mut self, routes: HashMap<String, String>) -> Self {
        self.routes = routes;
        self
    }

    pub fn url_for(&self, form_type: &FormType) -> String {
        match self.routes.get(form_type.as_str()) {
            Some(path) => format!("{}{}", self.base_url, path),
            None => format!("{}/api/{}", self.base_url, form_type),
        }
    }
}

#[async_trait]
impl SubmissionGateway for HttpGateway {
    async fn deliver(
        &self,
        form_type: &FormType,
        payload: &Map<String, Value>,
    ) -> Result<Value, GatewayError> {
        let url = self.url_for(form_type);

        let resp = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(format!("Request to {url} failed: {e}")))?;

        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        tracing::debug!("Gateway answered {status} for {form_type} submission");

        interpret_response(status, &body)
    }
}
