use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

use crate::client::{Backoff, SubmitOptions};
use crate::models::FormType;
use crate::queue::DEFAULT_MAX_ATTEMPTS;
use crate::store::DEFAULT_QUEUE_SLOT;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub gateway_url: String,
    pub host: IpAddr,
    pub port: u16,
    pub max_body_size: usize,
    pub queue_slot: String,
    pub queue_max_attempts: u32,
    pub retry_count: u32,
    pub retry_delay_ms: u64,
    pub backoff: Backoff,
    pub request_timeout_secs: u64,
    pub probe_url: String,
    pub probe_interval_secs: u64,
    /// form type -> gateway path
    pub form_routes: HashMap<String, String>,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let gateway_url = env_required("FORMRELAY_GATEWAY_URL")?
            .trim_end_matches('/')
            .to_string();

        let database_url = env_or("FORMRELAY_DATABASE_URL", "sqlite://formrelay.db");

        let host: IpAddr = env_or("FORMRELAY_HOST", "127.0.0.1")
            .parse()
            .map_err(|e| format!("Invalid FORMRELAY_HOST: {e}"))?;

        let port: u16 = env_or("FORMRELAY_PORT", "3100")
            .parse()
            .map_err(|e| format!("Invalid FORMRELAY_PORT: {e}"))?;

        let max_body_size: usize = env_or("FORMRELAY_MAX_BODY_SIZE", "65536")
            .parse()
            .map_err(|e| format!("Invalid FORMRELAY_MAX_BODY_SIZE: {e}"))?;

        let queue_slot = env_or("FORMRELAY_QUEUE_SLOT", DEFAULT_QUEUE_SLOT);

        let queue_max_attempts: u32 =
            env_or("FORMRELAY_QUEUE_MAX_ATTEMPTS", &DEFAULT_MAX_ATTEMPTS.to_string())
                .parse()
                .map_err(|e| format!("Invalid FORMRELAY_QUEUE_MAX_ATTEMPTS: {e}"))?;

        let retry_count: u32 = env_or("FORMRELAY_RETRY_COUNT", "3")
            .parse()
            .map_err(|e| format!("Invalid FORMRELAY_RETRY_COUNT: {e}"))?;

        let retry_delay_ms: u64 = env_or("FORMRELAY_RETRY_DELAY_MS", "2000")
            .parse()
            .map_err(|e| format!("Invalid FORMRELAY_RETRY_DELAY_MS: {e}"))?;

        let backoff_max_ms: u64 = env_or("FORMRELAY_BACKOFF_MAX_MS", "30000")
            .parse()
            .map_err(|e| format!("Invalid FORMRELAY_BACKOFF_MAX_MS: {e}"))?;

        let backoff = match env_or("FORMRELAY_BACKOFF", "fixed").as_str() {
            "fixed" => Backoff::Fixed,
            "exponential" => Backoff::Exponential {
                max_delay: Duration::from_millis(backoff_max_ms),
                jitter: true,
            },
            other => return Err(format!("Invalid FORMRELAY_BACKOFF: {other}")),
        };

        let request_timeout_secs: u64 = env_or("FORMRELAY_REQUEST_TIMEOUT_SECS", "30")
            .parse()
            .map_err(|e| format!("Invalid FORMRELAY_REQUEST_TIMEOUT_SECS: {e}"))?;

        let probe_url = env_or("FORMRELAY_PROBE_URL", &format!("{gateway_url}/api/health"));

        let probe_interval_secs: u64 = env_or("FORMRELAY_PROBE_INTERVAL_SECS", "5")
            .parse()
            .map_err(|e| format!("Invalid FORMRELAY_PROBE_INTERVAL_SECS: {e}"))?;

        let form_routes = parse_form_routes(&env_or("FORMRELAY_FORM_ROUTES", ""))?;

        let log_level = env_or("FORMRELAY_LOG_LEVEL", "info");

        Ok(Config {
            database_url,
            gateway_url,
            host,
            port,
            max_body_size,
            queue_slot,
            queue_max_attempts,
            retry_count,
            retry_delay_ms,
            backoff,
            request_timeout_secs,
            probe_url,
            probe_interval_secs,
            form_routes,
            log_level,
        })
    }

    pub fn submit_options(&self) -> SubmitOptions {
        SubmitOptions {
            retry_count: self.retry_count,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            track_progress: true,
            backoff: self.backoff,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Parse `free-class=/api/leads,contact=/api/contact` into a route table.
pub fn parse_form_routes(raw: &str) -> Result<HashMap<String, String>, String> {
    raw.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|entry| {
            let (form, path) = entry
                .split_once('=')
                .ok_or_else(|| format!("Invalid FORMRELAY_FORM_ROUTES entry '{entry}': expected form=path"))?;
            let form = FormType::parse(form)
                .map_err(|e| format!("Invalid FORMRELAY_FORM_ROUTES entry '{entry}': {e}"))?;
            let path = path.trim();
            if !path.starts_with('/') {
                return Err(format!(
                    "Invalid FORMRELAY_FORM_ROUTES entry '{entry}': path must start with '/'"
                ));
            }
            Ok((form.to_string(), path.to_string()))
        })
        .collect()
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
