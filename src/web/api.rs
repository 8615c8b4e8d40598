use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{ConfigError, RoutingConfig, TransportConfig};
use crate::delivery::{DeliveryOutcome, HealthSnapshot, Statistics};
use crate::fallback::{DeliveryReport, FallbackOrchestrator, OrchestratorError};
use crate::record::{LogRecord, RoutingMetadata};
use crate::registry::ForwarderRegistry;

/// Shared state for the monitoring API
#[derive(Clone)]
pub struct MonitorState {
    pub registry: Arc<ForwarderRegistry>,
    pub orchestrator: Arc<FallbackOrchestrator>,
}

#[derive(Debug, Serialize)]
pub struct StatisticsReport {
    #[serde(flatten)]
    pub statistics: Statistics,
    pub success_rate: f64,
}

impl From<Statistics> for StatisticsReport {
    fn from(statistics: Statistics) -> Self {
        let success_rate = statistics.success_rate();
        Self {
            statistics,
            success_rate,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConfigurationReport {
    #[serde(flatten)]
    pub transport: TransportConfig,
    #[serde(flatten)]
    pub routing: RoutingConfig,
}

#[derive(Debug, Serialize)]
pub struct MonitorResponse {
    pub health: HealthSnapshot,
    pub statistics: StatisticsReport,
    pub configuration: ConfigurationReport,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub records: Vec<LogRecord>,
    #[serde(default)]
    pub metadata: Option<RoutingMetadata>,
}

pub async fn health() -> &'static str {
    "OK"
}

/// GET /api/forwarder/monitor
pub async fn get_monitor(
    State(state): State<MonitorState>,
) -> Result<Json<MonitorResponse>, ApiError> {
    let engine = state.registry.engine().await?;
    let health = engine.health_check().await;
    let statistics = engine.stats().snapshot();

    Ok(Json(MonitorResponse {
        health,
        statistics: statistics.into(),
        configuration: ConfigurationReport {
            transport: engine.config().clone(),
            routing: RoutingConfig {
                use_primary_transport: state.orchestrator.uses_primary_transport(),
            },
        },
    }))
}

/// POST /api/forwarder/test
pub async fn send_test(
    State(state): State<MonitorState>,
) -> Result<Json<DeliveryOutcome>, ApiError> {
    let engine = state.registry.engine().await?;
    Ok(Json(engine.send_test_record().await))
}

/// POST /api/forwarder/reset
pub async fn reset_statistics(
    State(state): State<MonitorState>,
) -> Result<Json<MessageResponse>, ApiError> {
    let engine = state.registry.engine().await?;
    engine.stats().reset();
    Ok(Json(MessageResponse {
        message: "Statistics reset".to_string(),
    }))
}

/// POST /api/logs/ingest
pub async fn ingest(
    State(state): State<MonitorState>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<DeliveryReport>, ApiError> {
    if request.records.is_empty() {
        return Err(ApiError::BadRequest("records cannot be empty".to_string()));
    }

    let mut records = request.records;
    if let Some(metadata) = &request.metadata {
        metadata.apply_all(&mut records);
    }

    let report = state.orchestrator.deliver(&records).await?;
    Ok(Json(report))
}

// Error handling
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    InternalError(String),
}

impl From<ConfigError> for ApiError {
    fn from(e: ConfigError) -> Self {
        ApiError::InternalError(e.to_string())
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(e: OrchestratorError) -> Self {
        ApiError::InternalError(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
