use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use formrelay::client::SubmissionClient;
use formrelay::config::Config;
use formrelay::connectivity::ProbeConnectivity;
use formrelay::gateway::HttpGateway;
use formrelay::queue::OfflineQueue;
use formrelay::store::SqliteStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Load config
    let config = Config::from_env()?;

    // Init tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(&config.log_level)
        }))
        .init();

    tracing::info!("Starting formrelay (gateway {})", config.gateway_url);

    let store = SqliteStore::connect(&config.database_url).await?;
    tracing::info!("Queue storage ready at {}", config.database_url);

    let queue = OfflineQueue::new(Arc::new(store))
        .with_slot(config.queue_slot.clone())
        .with_max_attempts(config.queue_max_attempts);

    let gateway = HttpGateway::new(&config.gateway_url, config.request_timeout())?
        .with_routes(config.form_routes.clone());

    let probe = Arc::new(ProbeConnectivity::new(
        config.probe_url.clone(),
        Duration::from_secs(config.probe_interval_secs),
        config.request_timeout(),
    )?);

    let client = Arc::new(
        SubmissionClient::new(Arc::new(gateway), Arc::new(queue), probe.clone())
            .with_defaults(config.submit_options()),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Listeners must exist before the probe can report a transition
    let _auto_drain = client.start_auto_drain();
    let _queue_count = client.monitor().setup_queue_listener(|len| {
        tracing::info!("Offline queue holds {len} submission(s)");
    });
    let probe_task = probe.spawn(shutdown_rx);

    // Anything left over from the last run
    if client.is_online() {
        match client.process_queued_submissions().await {
            Ok(report) => tracing::info!("Startup drain: {} remaining", report.remaining),
            Err(e) => tracing::error!("Startup drain failed: {e}"),
        }
    }

    let addr = SocketAddr::new(config.host, config.port);
    let app = formrelay::build_app(config, client);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    let _ = probe_task.await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
