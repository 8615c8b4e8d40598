use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use super::store::{FallbackStore, StoreError};
use crate::config::ConfigError;
use crate::delivery::BatchResult;
use crate::record::LogRecord;
use crate::registry::ForwarderRegistry;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The durable store could not take the records the primary path rejected.
    #[error("fallback store accepted {written} of {attempted} records: {reason}")]
    FallbackWrite {
        attempted: usize,
        written: usize,
        reason: String,
    },

    #[error("delivery engine unavailable: {0}")]
    Engine(#[from] ConfigError),
}

impl OrchestratorError {
    fn fallback_write(attempted: usize, written: usize, source: Option<StoreError>) -> Self {
        OrchestratorError::FallbackWrite {
            attempted,
            written,
            reason: source
                .map(|e| e.to_string())
                .unwrap_or_else(|| "short write".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMethod {
    Primary,
    Fallback,
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Success,
    /// Some records needed the fallback store
    Partial,
}

/// How a request's records were split between the two paths.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryReport {
    pub total: usize,
    pub via_primary: usize,
    pub via_fallback: usize,
    pub method: DeliveryMethod,
    pub status: DeliveryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch: Option<BatchResult>,
}

/// Routes each request to the aggregator, or to the fallback store when the
/// primary path is disabled or could not accept some records.
pub struct FallbackOrchestrator {
    registry: Arc<ForwarderRegistry>,
    store: Arc<dyn FallbackStore>,
    use_primary_transport: bool,
}

impl FallbackOrchestrator {
    pub fn new(
        registry: Arc<ForwarderRegistry>,
        store: Arc<dyn FallbackStore>,
        use_primary_transport: bool,
    ) -> Self {
        Self {
            registry,
            store,
            use_primary_transport,
        }
    }

    pub fn uses_primary_transport(&self) -> bool {
        self.use_primary_transport
    }

    pub async fn deliver(&self, records: &[LogRecord]) -> Result<DeliveryReport, OrchestratorError> {
        if records.is_empty() {
            return Ok(DeliveryReport {
                total: 0,
                via_primary: 0,
                via_fallback: 0,
                method: if self.use_primary_transport {
                    DeliveryMethod::Primary
                } else {
                    DeliveryMethod::Fallback
                },
                status: DeliveryStatus::Success,
                batch: None,
            });
        }

        if !self.use_primary_transport {
            self.append_to_store(records).await?;
            info!(count = records.len(), "Primary transport disabled, stored records directly");
            return Ok(DeliveryReport {
                total: records.len(),
                via_primary: 0,
                via_fallback: records.len(),
                method: DeliveryMethod::Fallback,
                status: DeliveryStatus::Success,
                batch: None,
            });
        }

        let engine = self.registry.engine().await?;
        let batch = engine.send_in_batches(records, None).await;

        if batch.failed == 0 {
            return Ok(DeliveryReport {
                total: records.len(),
                via_primary: batch.sent,
                via_fallback: 0,
                method: DeliveryMethod::Primary,
                status: DeliveryStatus::Success,
                batch: Some(batch),
            });
        }

        let failed: Vec<LogRecord> = batch
            .failed_indexes()
            .map(|index| records[index].clone())
            .collect();

        warn!(
            failed = failed.len(),
            sent = batch.sent,
            "Primary transport rejected records, writing them to fallback store"
        );
        self.append_to_store(&failed).await?;

        Ok(DeliveryReport {
            total: records.len(),
            via_primary: batch.sent,
            via_fallback: failed.len(),
            method: if batch.sent == 0 {
                DeliveryMethod::Fallback
            } else {
                DeliveryMethod::Mixed
            },
            status: DeliveryStatus::Partial,
            batch: Some(batch),
        })
    }

    async fn append_to_store(&self, records: &[LogRecord]) -> Result<(), OrchestratorError> {
        match self.store.append_many(records).await {
            Ok(written) if written == records.len() => Ok(()),
            Ok(written) => {
                error!(attempted = records.len(), written, "Fallback store short write");
                Err(OrchestratorError::fallback_write(records.len(), written, None))
            }
            Err(e) => {
                error!(attempted = records.len(), error = %e, "Fallback store write failed");
                Err(OrchestratorError::fallback_write(records.len(), 0, Some(e)))
            }
        }
    }
}
