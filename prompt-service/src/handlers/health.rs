use crate::services::get_metrics;
use crate::startup::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;

const SERVICE_NAME: &str = "prompt-service";

pub async fn root() -> impl IntoResponse {
    Json(json!({ "message": "Prompt service is running" }))
}

/// Liveness probe. Reports unhealthy when either record store is unreachable.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let checks = [
        state.generate.store().health_check().await,
        state.explain.store().health_check().await,
    ];

    match checks.into_iter().find_map(Result::err) {
        None => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": SERVICE_NAME,
                "version": env!("CARGO_PKG_VERSION")
            })),
        ),
        Some(e) => {
            tracing::warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": SERVICE_NAME,
                    "error": e.to_string()
                })),
            )
        }
    }
}

/// Readiness probe. Both stores and the text provider must be reachable.
pub async fn readiness_check(State(state): State<AppState>) -> StatusCode {
    let generate = state.generate.store().health_check().await;
    let explain = state.explain.store().health_check().await;
    if let Err(e) = generate.and(explain) {
        tracing::warn!(error = %e, "Readiness check failed: record store unavailable");
        return StatusCode::SERVICE_UNAVAILABLE;
    }

    let provider = state.generate.provider();
    if let Err(e) = provider.health_check().await {
        tracing::warn!(provider = provider.name(), error = %e, "Readiness check failed: provider unavailable");
        return StatusCode::SERVICE_UNAVAILABLE;
    }

    StatusCode::OK
}

pub async fn metrics_endpoint() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        get_metrics(),
    )
}
