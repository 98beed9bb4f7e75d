// HTTP route handlers for the Academy API

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use academy_common::types::ExecutionRequest;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use crate::metrics;
use crate::AppState;

pub const API_VERSION: &str = "1.0.0";

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub code: String,
    /// Seconds; falls back to the configured default
    pub timeout: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub module_id: String,
    pub exercise_id: String,
    pub code: String,
}

/// GET / - API info
pub async fn root(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "name": state.settings.app_name,
        "version": API_VERSION,
        "status": "running",
        "endpoints": {
            "curriculum": "/api/curriculum",
            "modules": "/api/modules/{module_id}",
            "execute": "/api/execute",
            "validate": "/api/validate",
            "docs": "/api/docs/pytorch/{symbol}",
            "metrics": "/metrics",
        },
    }))
}

/// GET /health - Liveness check
pub async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

/// GET /metrics - Prometheus scrape endpoint
pub async fn metrics_handler() -> Response {
    match metrics::render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// GET /api/curriculum - Sections with their module metadata
pub async fn get_curriculum(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.content.curriculum())
}

/// GET /api/modules - All module ids
pub async fn list_modules(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.content.module_ids())
}

/// GET /api/modules/:module_id - Full module with lesson body and exercises
pub async fn get_module(
    State(state): State<Arc<AppState>>,
    Path(module_id): Path<String>,
) -> Response {
    match state.content.get_module(&module_id) {
        Some(module) => Json(module.as_ref().clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": format!("Module '{}' not found", module_id) })),
        )
            .into_response(),
    }
}

/// POST /api/execute - Run a snippet and return its output
pub async fn execute_code(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ExecuteRequest>,
) -> impl IntoResponse {
    let timeout = payload
        .timeout
        .unwrap_or(state.settings.engine.default_timeout_secs);
    let request = ExecutionRequest::new(payload.code, timeout);

    let result = state.executor.execute(&request).await;
    metrics::record_execution(&result);

    info!(
        success = result.succeeded,
        execution_time = result.elapsed_seconds,
        "Execute request served"
    );
    Json(result)
}

/// POST /api/validate - Check learner code against an exercise.
/// Every outcome, including unknown ids, is a 200 with a verdict body.
pub async fn validate_exercise(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ValidateRequest>,
) -> impl IntoResponse {
    let verdict = state
        .validator
        .validate(&payload.module_id, &payload.exercise_id, &payload.code)
        .await;
    metrics::record_validation(&verdict);

    info!(
        module_id = %payload.module_id,
        exercise_id = %payload.exercise_id,
        result = %verdict.outcome,
        "Validate request served"
    );
    Json(verdict)
}

/// GET /api/docs/pytorch/*symbol - Signature and summary for a PyTorch symbol
pub async fn get_pytorch_docs(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Response {
    match state.docs.lookup(&symbol).await {
        Some(info) => Json(info).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": format!("Documentation for '{}' not found", symbol) })),
        )
            .into_response(),
    }
}

/// GET /api/docs/pytorch-cached - Symbols currently held in the docs cache
pub async fn get_cached_symbols(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "cached_symbols": state.docs.cached_symbols().await }))
}
