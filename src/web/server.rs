use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use super::api::{get_monitor, health, ingest, reset_statistics, send_test, MonitorState};
use crate::config::WebConfig;

pub fn router(state: MonitorState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/forwarder/monitor", get(get_monitor))
        .route("/api/forwarder/test", post(send_test))
        .route("/api/forwarder/reset", post(reset_statistics))
        .route("/api/logs/ingest", post(ingest))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the monitoring API on an already bound listener until shutdown is signalled
pub async fn serve(
    listener: TcpListener,
    state: MonitorState,
    mut shutdown_rx: watch::Receiver<bool>,
) -> std::io::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.wait_for(|&v| v).await;
            tracing::info!("Monitoring server shutting down gracefully");
        })
        .await
}

/// Bind the configured address and serve the monitoring API
pub async fn run_server(
    state: MonitorState,
    web_config: WebConfig,
    shutdown_rx: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(&web_config.listen).await?;
    tracing::info!("Monitoring server listening on {}", web_config.listen);

    serve(listener, state, shutdown_rx).await
}
