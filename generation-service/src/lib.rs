pub mod config;
pub mod dtos;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method, Request, StatusCode},
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::{get, patch, post, put},
    Json, Router,
};
use secrecy::Secret;
use service_core::error::{AppError, ErrorResponse};
use service_core::middleware::{
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware},
    security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::config::HttpConfig;
use crate::middleware::admin::ADMIN_API_KEY_HEADER;
use crate::services::{AccountStore, GenerationGateway, IdentityVerifier, UsageLedger};

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<GenerationGateway>,
    pub accounts: Arc<dyn AccountStore>,
    pub ledger: Arc<dyn UsageLedger>,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub admin_api_key: Option<Secret<String>>,
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new("NotFound", "Route not found")),
    )
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}. Skipping.", origin, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(ADMIN_API_KEY_HEADER),
        ])
}

pub fn build_router(state: AppState, http: &HttpConfig) -> Result<Router, AppError> {
    let ip_limiter = create_ip_rate_limiter(http.rate_limit_requests, http.rate_limit_window_secs)?;

    // Routes that need a verified bearer credential
    let authenticated = Router::new()
        .route("/api/auth/session", post(handlers::auth::session))
        .route("/api/generate/text", post(handlers::generate::generate_text))
        .route(
            "/api/generate/document",
            post(handlers::generate::generate_document),
        )
        .route("/api/generate/pdf", post(handlers::generate::generate_document))
        .route("/api/generate/history", get(handlers::generate::history))
        .route("/api/users/me", get(handlers::user::get_me))
        .route(
            "/api/users/me/settings",
            patch(handlers::user::update_settings),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    // Billing collaborator hook
    let admin = Router::new()
        .route("/api/users/:id/billing", put(handlers::user::update_billing))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::admin_auth_middleware,
        ));

    let app = Router::new()
        .route("/api/health", get(handlers::health::api_health))
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/password", post(handlers::auth::change_password))
        .merge(authenticated)
        .merge(admin)
        .fallback(not_found)
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(http.body_limit_bytes))
        // Global IP rate limiting
        .layer(from_fn_with_state(ip_limiter, ip_rate_limit_middleware))
        .layer(from_fn(middleware::metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors_layer(&http.allowed_origins));

    Ok(app)
}
