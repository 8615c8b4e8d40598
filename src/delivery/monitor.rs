use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::outcome::DeliveryError;
use crate::config::TransportMode;

/// Running delivery counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Statistics {
    pub total_sent: u64,
    pub total_failed: u64,
    pub total_retries: u64,
    pub last_error: Option<String>,
    pub last_success_at: Option<DateTime<Utc>>,
}

impl Statistics {
    /// Share of records accepted, 0 when nothing has been attempted.
    pub fn success_rate(&self) -> f64 {
        let total = self.total_sent + self.total_failed;
        if total == 0 {
            0.0
        } else {
            self.total_sent as f64 / total as f64
        }
    }
}

/// What a single attempt amounted to.
#[derive(Debug, Clone, Copy)]
pub enum AttemptOutcome<'a> {
    Delivered,
    /// Failed, another attempt follows
    Retrying(&'a DeliveryError),
    /// Failed, no attempts left for this record
    GaveUp(&'a DeliveryError),
}

/// Owner of the delivery [`Statistics`]. Everyone else only reports events.
#[derive(Debug, Default)]
pub struct StatsMonitor {
    stats: Mutex<Statistics>,
}

impl StatsMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Statistics> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_attempt(&self, outcome: AttemptOutcome<'_>, was_retry: bool) {
        let mut stats = self.lock();
        if was_retry {
            stats.total_retries += 1;
        }
        match outcome {
            AttemptOutcome::Delivered => {
                stats.total_sent += 1;
                stats.last_success_at = Some(Utc::now());
            }
            AttemptOutcome::Retrying(error) => {
                stats.last_error = Some(error.to_string());
            }
            AttemptOutcome::GaveUp(error) => {
                stats.total_failed += 1;
                stats.last_error = Some(error.to_string());
            }
        }
    }

    /// Note an error that is not tied to a record, such as a failed health probe.
    pub fn record_error(&self, error: impl ToString) {
        self.lock().last_error = Some(error.to_string());
    }

    pub fn snapshot(&self) -> Statistics {
        self.lock().clone()
    }

    pub fn reset(&self) {
        *self.lock() = Statistics::default();
        tracing::info!("Delivery statistics reset");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// Reserved for a latency threshold; never derived from connection state
    Degraded,
    Unhealthy,
}

/// Point-in-time health of the aggregator connection. Computed on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    pub status: HealthStatus,
    pub connected: bool,
    pub host: String,
    pub port: u16,
    pub mode: TransportMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
