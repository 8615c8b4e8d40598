use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    pub fallback: FallbackConfig,
    pub web: WebConfig,
}

/// Connection and retry settings for the aggregator transport.
///
/// Immutable once handed to a [`DeliveryEngine`](crate::delivery::DeliveryEngine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub mode: TransportMode,
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Additional attempts after the first failure, per record
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
    /// Fixed delay between attempts
    #[serde(default = "default_retry_delay", with = "humantime_serde")]
    pub retry_delay: Duration,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_host() -> String {
    "logstash".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_max_retry_attempts() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_batch_size() -> usize {
    100
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            mode: TransportMode::default(),
            connect_timeout: default_connect_timeout(),
            max_retry_attempts: default_max_retry_attempts(),
            retry_delay: default_retry_delay(),
            batch_size: default_batch_size(),
        }
    }
}

impl TransportConfig {
    /// Collects every problem with this section, prefixed with `transport.`
    pub fn problems(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.host.trim().is_empty() {
            errors.push("transport.host cannot be empty".to_string());
        }
        if self.port == 0 {
            errors.push("transport.port must be between 1 and 65535".to_string());
        }
        if self.connect_timeout.is_zero() {
            errors.push("transport.connect_timeout must be greater than zero".to_string());
        }
        if self.batch_size == 0 {
            errors.push("transport.batch_size must be at least 1".to_string());
        }

        errors
    }

    pub fn validate(&self) -> Result<(), super::ConfigError> {
        let errors = self.problems();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(super::ConfigError::ValidationList(errors))
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Ordered, connection-oriented byte stream
    #[default]
    #[serde(alias = "tcp")]
    Reliable,
    /// One datagram per frame, no delivery guarantee
    #[serde(rename = "besteffort", alias = "udp")]
    BestEffort,
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportMode::Reliable => write!(f, "reliable"),
            TransportMode::BestEffort => write!(f, "besteffort"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default = "default_use_primary_transport")]
    pub use_primary_transport: bool,
}

fn default_use_primary_transport() -> bool {
    true
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            use_primary_transport: default_use_primary_transport(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    pub listen: String,
}
