use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use secrecy::ExposeSecret;
use service_core::error::ErrorResponse;
use subtle::ConstantTimeEq;

use crate::AppState;

pub const ADMIN_API_KEY_HEADER: &str = "x-admin-api-key";

/// Guard for operator and billing-system routes. Without a configured key the
/// routes are closed.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.admin_api_key.as_ref() else {
        tracing::warn!("Admin route called but ADMIN_API_KEY is not configured");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new(
                "AdminDisabled",
                "Administrative API is not configured",
            )),
        )
            .into_response();
    };

    let provided = headers
        .get(ADMIN_API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    match provided {
        Some(key) if bool::from(key.as_bytes().ct_eq(expected.expose_secret().as_bytes())) => {
            next.run(request).await
        }
        _ => {
            tracing::warn!("Failed admin authentication attempt");
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new(
                    "Unauthorized",
                    "Invalid or missing admin API key",
                )),
            )
                .into_response()
        }
    }
}
