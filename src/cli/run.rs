use crate::config::parse::load_config;
use crate::config::Config;
use crate::fallback::{DuckDbStore, FallbackOrchestrator, StoreError};
use crate::registry::ForwarderRegistry;
use crate::web::{run_server, MonitorState};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("fallback store error: {0}")]
    Store(#[from] StoreError),

    #[error("delivery error: {0}")]
    Orchestrator(#[from] crate::fallback::OrchestratorError),

    #[error("transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    #[error("framing error: {0}")]
    Frame(#[from] crate::record::FrameError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid record on line {line}: {reason}")]
    InvalidRecord { line: usize, reason: String },

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Fail with a pointer to the searched locations when no config was found
pub fn require_config_path(config_path: Option<PathBuf>) -> PathBuf {
    match config_path {
        Some(path) => path,
        None => {
            eprintln!("Error: config not found");
            eprintln!("Searched locations:");
            eprintln!("  ~/.config/logrelay/config.yml");
            eprintln!("  /etc/logrelay/config.yml");
            eprintln!("\nUse --config <path> to specify a config file, or run 'logrelay config init' to generate one.");
            std::process::exit(1);
        }
    }
}

/// Everything a process needs to deliver records
pub struct Services {
    pub registry: Arc<ForwarderRegistry>,
    pub orchestrator: Arc<FallbackOrchestrator>,
}

pub async fn build_services(config: &Config) -> Result<Services, RunError> {
    config.transport.validate()?;

    info!(path = %config.fallback.path.display(), "Initializing fallback store");
    let store = Arc::new(DuckDbStore::new(&config.fallback.path)?);
    store.init_schema().await?;

    let registry = Arc::new(ForwarderRegistry::new(config.transport.clone()));
    let orchestrator = Arc::new(FallbackOrchestrator::new(
        registry.clone(),
        store,
        config.routing.use_primary_transport,
    ));

    Ok(Services {
        registry,
        orchestrator,
    })
}

pub async fn run(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = require_config_path(config_path);
    run_service(&config_path).await.map_err(|e| e.into())
}

async fn run_service(config_path: &Path) -> Result<(), RunError> {
    info!(config_path = %config_path.display(), "Loading configuration");
    let config = load_config(config_path)?;

    let services = build_services(&config).await?;
    info!(
        address = %config.transport.address(),
        mode = %config.transport.mode,
        use_primary_transport = config.routing.use_primary_transport,
        "Delivery services ready"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let state = MonitorState {
        registry: services.registry.clone(),
        orchestrator: services.orchestrator.clone(),
    };
    let web_config = config.web.clone();
    let mut web_handle = tokio::spawn(async move { run_server(state, web_config, shutdown_rx).await });

    info!("Relay started, press Ctrl+C to shutdown");

    let web_result = tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
            web_handle.await
        }
        result = &mut web_handle => result,
    };

    services.registry.shutdown().await;

    match web_result {
        Ok(Ok(())) => info!("Monitoring server stopped"),
        Ok(Err(e)) => {
            error!(error = %e, "Monitoring server error");
            return Err(e.into());
        }
        Err(e) => {
            error!(error = %e, "Monitoring server join error");
            return Err(e.into());
        }
    }

    info!("Shutdown complete");

    Ok(())
}
