pub mod config;
pub mod error;
pub mod state;
pub mod models;
pub mod store;
pub mod gateway;
pub mod queue;
pub mod connectivity;
pub mod client;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, header};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::client::SubmissionClient;
use crate::config::Config;
use crate::state::{AppState, SharedState};

pub fn build_app(config: Config, client: Arc<SubmissionClient>) -> Router {
    let max_body_size = config.max_body_size;
    let state: SharedState = Arc::new(AppState { client });

    // Form pages post here from the marketing site's origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .merge(routes::api_routes())
        .route("/health", axum::routing::get(health))
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("cache-control"),
            HeaderValue::from_static("no-store"),
        ))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
