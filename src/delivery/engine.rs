use serde::Serialize;
use serde_json::json;
use std::num::NonZeroUsize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::monitor::{AttemptOutcome, HealthSnapshot, HealthStatus, StatsMonitor};
use super::outcome::{BatchResult, DeliveryError, DeliveryOutcome};
use crate::config::{ConfigError, TransportConfig};
use crate::record::encode_frame;
use crate::transport::{SocketTransport, Transport};

/// Frames records, drives the shared transport and applies the retry policy.
///
/// Connection access is serialized by an async mutex held for the duration of
/// one attempt, so concurrent callers never interleave partial frames. The
/// statistics lock is only ever taken while holding the connection lock, or
/// alone.
pub struct DeliveryEngine {
    config: TransportConfig,
    transport: Mutex<Box<dyn Transport>>,
    stats: StatsMonitor,
}

impl DeliveryEngine {
    /// Build an engine with a socket transport for `config`.
    pub fn new(config: TransportConfig) -> Result<Self, ConfigError> {
        let transport = SocketTransport::new(&config);
        Self::with_transport(config, Box::new(transport))
    }

    pub fn with_transport(
        config: TransportConfig,
        transport: Box<dyn Transport>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            transport: Mutex::new(transport),
            stats: StatsMonitor::new(),
        })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn stats(&self) -> &StatsMonitor {
        &self.stats
    }

    pub async fn is_connected(&self) -> bool {
        self.transport.lock().await.is_open()
    }

    /// Deliver one record with up to `max_retry_attempts` extra attempts.
    ///
    /// Never fails: transport problems end up in the returned outcome.
    pub async fn send_one<R: Serialize + Sync + ?Sized>(&self, record: &R) -> DeliveryOutcome {
        let frame = match encode_frame(record) {
            Ok(frame) => frame,
            Err(e) => {
                let error = DeliveryError::Serialization(e.to_string());
                warn!(error = %error, "Dropping record that cannot be framed");
                self.stats.record_attempt(AttemptOutcome::GaveUp(&error), false);
                return DeliveryOutcome::rejected(0, error);
            }
        };

        let attempts_allowed = self.config.max_retry_attempts.saturating_add(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let is_last = attempt >= attempts_allowed;

            match self.attempt(&frame, attempt > 1, is_last).await {
                Ok(()) => return DeliveryOutcome::accepted(attempt),
                Err(error) if is_last => {
                    error!(
                        attempts = attempt,
                        error = %error,
                        "Giving up on record after exhausting retries"
                    );
                    return DeliveryOutcome::rejected(attempt, error);
                }
                Err(error) => {
                    warn!(
                        attempt = attempt,
                        max_attempts = attempts_allowed,
                        retry_delay_ms = self.config.retry_delay.as_millis() as u64,
                        error = %error,
                        "Delivery attempt failed, retrying"
                    );
                    if !self.config.retry_delay.is_zero() {
                        tokio::time::sleep(self.config.retry_delay).await;
                    }
                }
            }
        }
    }

    /// One try: (re)open if needed, write the frame, report to statistics.
    async fn attempt(&self, frame: &[u8], was_retry: bool, is_last: bool) -> Result<(), DeliveryError> {
        let mut transport = self.transport.lock().await;

        let result = match transport.open().await {
            Ok(()) => transport.send_frame(frame).await,
            Err(e) => Err(e),
        }
        .map_err(DeliveryError::from);

        match &result {
            Ok(()) => self.stats.record_attempt(AttemptOutcome::Delivered, was_retry),
            Err(error) => {
                // Next attempt starts from a fresh connection
                transport.close();
                let outcome = if is_last {
                    AttemptOutcome::GaveUp(error)
                } else {
                    AttemptOutcome::Retrying(error)
                };
                self.stats.record_attempt(outcome, was_retry);
            }
        }

        result
    }

    /// Deliver records one at a time in input order; each gets its own retry budget.
    pub async fn send_many<R: Serialize + Sync>(&self, records: &[R]) -> BatchResult {
        let mut result = BatchResult {
            chunks: usize::from(!records.is_empty()),
            ..BatchResult::default()
        };

        for record in records {
            result.push(self.send_one(record).await);
        }

        result
    }

    /// Partition `records` into chunks of `batch_size` (default from config)
    /// and send each chunk with [`send_many`](Self::send_many).
    pub async fn send_in_batches<R: Serialize + Sync>(
        &self,
        records: &[R],
        batch_size: Option<NonZeroUsize>,
    ) -> BatchResult {
        let size = batch_size
            .map(NonZeroUsize::get)
            .unwrap_or(self.config.batch_size)
            .max(1);
        let total_chunks = records.len().div_ceil(size);
        let mut result = BatchResult::default();

        for (index, chunk) in records.chunks(size).enumerate() {
            let chunk_result = self.send_many(chunk).await;
            debug!(
                chunk = index + 1,
                chunks = total_chunks,
                sent = chunk_result.sent,
                failed = chunk_result.failed,
                "Delivered chunk"
            );
            result.merge(chunk_result);
        }

        if result.failed > 0 {
            warn!(
                sent = result.sent,
                failed = result.failed,
                "Some records could not be delivered"
            );
        } else if !records.is_empty() {
            info!(sent = result.sent, chunks = result.chunks, "Delivered records");
        }

        result
    }

    /// Send a synthetic record through the normal path.
    pub async fn send_test_record(&self) -> DeliveryOutcome {
        let host = hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());

        let record = json!({
            "message": "Test record from logrelay monitoring",
            "level": "INFO",
            "source": "monitor",
            "host": host,
        });

        self.send_one(&record).await
    }

    /// Probe the connection, opening it if it is closed.
    pub async fn health_check(&self) -> HealthSnapshot {
        let mut transport = self.transport.lock().await;
        let endpoint = transport.endpoint();

        let (status, error) = match transport.open().await {
            Ok(()) => (HealthStatus::Healthy, None),
            Err(e) => {
                warn!(error = %e, "Health check could not reach aggregator");
                self.stats.record_error(&e);
                (HealthStatus::Unhealthy, Some(e.to_string()))
            }
        };

        HealthSnapshot {
            status,
            connected: transport.is_open(),
            host: endpoint.host,
            port: endpoint.port,
            mode: endpoint.mode,
            error,
        }
    }

    /// Close the connection. The next send reopens it.
    pub async fn shutdown(&self) {
        self.transport.lock().await.close();
        info!(address = %self.config.address(), "Delivery engine shut down");
    }
}
