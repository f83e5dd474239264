use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::AppState;

/// Liveness for the web client. Does not touch storage.
pub async fn api_health() -> impl IntoResponse {
    Json(json!({
        "status": "OK",
        "message": "LovableClone API is running"
    }))
}

/// Health probe for Docker/K8s: checks both stores.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let accounts = state.accounts.health_check().await;
    let ledger = state.ledger.health_check().await;

    match (accounts, ledger) {
        (Ok(()), Ok(())) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": "generation-service",
                "version": env!("CARGO_PKG_VERSION")
            })),
        ),
        (accounts, ledger) => {
            let error = accounts
                .err()
                .or(ledger.err())
                .map(|e| e.to_string())
                .unwrap_or_default();
            tracing::error!(error = %error, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": "generation-service",
                    "error": "storage unavailable"
                })),
            )
        }
    }
}

/// Readiness probe for K8s.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.accounts.health_check().await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
