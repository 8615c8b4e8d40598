pub mod engine;
pub mod monitor;
pub mod outcome;

pub use engine::DeliveryEngine;
pub use monitor::{AttemptOutcome, HealthSnapshot, HealthStatus, Statistics, StatsMonitor};
pub use outcome::{BatchResult, DeliveryError, DeliveryOutcome, ErrorKind};
