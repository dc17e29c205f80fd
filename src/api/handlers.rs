use crate::api::AppState;
use crate::error::Result;
use crate::flow::{FlowOutcome, FlowStatsSnapshot};
use crate::models::ModelSummary;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Health check endpoint; degraded when the backing store does not answer in time
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let store = state.cache.store();
    let (status, code, models) = match state.cache.probe_store().await {
        Ok(count) => ("healthy", StatusCode::OK, Some(count)),
        Err(e) => {
            tracing::warn!(backend = store.backend_name(), error = %e, "Store health probe failed");
            ("degraded", StatusCode::SERVICE_UNAVAILABLE, None)
        }
    };

    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: state.started_at.elapsed().as_secs(),
            store_backend: store.backend_name().to_string(),
            models,
            cached_models: state.cache.entry_count().await,
            flows: state.flows.names(),
        }),
    )
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub store_backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models: Option<u64>,
    pub cached_models: u64,
    pub flows: Vec<String>,
}

/// Queue an event on a flow
pub async fn submit_event(
    State(state): State<AppState>,
    Path(flow): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<SubmitEventResponse>)> {
    let event_id = state.flows.submit(&flow, payload).await?;
    tracing::debug!(flow = %flow, event_id = %event_id, "Event queued");

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitEventResponse {
            status: "accepted".to_string(),
            flow,
            event_id,
        }),
    ))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitEventResponse {
    pub status: String,
    pub flow: String,
    pub event_id: Uuid,
}

/// Process an event synchronously and return its outcome
///
/// A failed event is still a 200: the outcome carries the `FAILED` state and reason.
pub async fn process_event(
    State(state): State<AppState>,
    Path(flow): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<FlowOutcome>> {
    Ok(Json(state.flows.process(&flow, payload).await?))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ModelPath {
    #[validate(length(min = 1, max = 255))]
    pub id: String,
}

/// Model metadata without its state
pub async fn get_model(
    State(state): State<AppState>,
    Path(path): Path<ModelPath>,
) -> Result<Json<ModelSummary>> {
    path.validate()?;
    let record = state.cache.get(&path.id).await?;
    Ok(Json(record.summary()))
}

/// Drop a model from this node's cache; the next read reloads it from the store
pub async fn evict_model(
    State(state): State<AppState>,
    Path(path): Path<ModelPath>,
) -> Result<StatusCode> {
    path.validate()?;
    state.cache.invalidate(&path.id).await;
    tracing::info!(model_id = %path.id, "Model evicted from near-cache");
    Ok(StatusCode::NO_CONTENT)
}

/// Per-flow statistics
pub async fn list_flows(State(state): State<AppState>) -> Json<Vec<FlowStatsSnapshot>> {
    Json(state.flows.stats())
}

/// Prometheus metrics endpoint
///
/// Returns metrics in Prometheus text exposition format
pub async fn metrics() -> (StatusCode, String) {
    let metrics = crate::metrics::gather_metrics();
    (StatusCode::OK, metrics)
}
