pub mod orchestrator;
pub mod store;

pub use orchestrator::{
    DeliveryMethod, DeliveryReport, DeliveryStatus, FallbackOrchestrator, OrchestratorError,
};
pub use store::{DuckDbStore, FallbackStore, StoreError};
