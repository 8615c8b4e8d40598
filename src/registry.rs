use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::config::{ConfigError, TransportConfig};
use crate::delivery::DeliveryEngine;

/// Holds the one delivery engine of the process.
///
/// Built once at startup and passed by `Arc` to everything that delivers, so
/// repeated calls reuse the open connection instead of reconnecting.
pub struct ForwarderRegistry {
    config: TransportConfig,
    engine: OnceCell<Arc<DeliveryEngine>>,
}

impl ForwarderRegistry {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            engine: OnceCell::new(),
        }
    }

    /// Registry around an already constructed engine.
    pub fn with_engine(engine: DeliveryEngine) -> Self {
        Self {
            config: engine.config().clone(),
            engine: OnceCell::new_with(Some(Arc::new(engine))),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// The shared engine, created on first use.
    pub async fn engine(&self) -> Result<Arc<DeliveryEngine>, ConfigError> {
        self.engine
            .get_or_try_init(|| async {
                tracing::info!(
                    address = %self.config.address(),
                    mode = %self.config.mode,
                    "Creating delivery engine"
                );
                DeliveryEngine::new(self.config.clone()).map(Arc::new)
            })
            .await
            .cloned()
    }

    /// Close the shared connection if an engine was ever created.
    pub async fn shutdown(&self) {
        if let Some(engine) = self.engine.get() {
            engine.shutdown().await;
        }
    }
}
