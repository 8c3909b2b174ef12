use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::ml::ServiceState;
use crate::models::{LoadModelResponse, PredictRequest, PredictResponse};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub message: String,
    pub version: String,
}

/// Service banner
pub async fn index() -> Json<IndexResponse> {
    Json(IndexResponse {
        message: "Insurance churn prediction service is running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_state: ServiceState,
    pub model_version: Option<String>,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        model_state: state.service.state().await,
        model_version: state.service.metadata().await.map(|m| m.version),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

/// Classify one policy holder
pub async fn predict(
    State(state): State<AppState>,
    body: std::result::Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>> {
    let Json(request) =
        body.map_err(|rejection| AppError::Validation(rejection.body_text()))?;

    let response = state.service.predict_request(&request).await?;
    Ok(Json(response))
}

/// Re-fetch the model artifact and swap it in
pub async fn load_model(State(state): State<AppState>) -> Result<Json<LoadModelResponse>> {
    let response = state.service.reload_response().await?;
    tracing::info!(
        location = %response.location,
        version = %response.model_version,
        "Model reloaded on request"
    );
    Ok(Json(response))
}

/// Prometheus exposition
pub async fn metrics(State(state): State<AppState>) -> Result<(StatusCode, String)> {
    if !state.metrics_enabled {
        return Err(AppError::NotFound("Metrics are disabled".to_string()));
    }
    Ok((StatusCode::OK, crate::metrics::gather_metrics()))
}
