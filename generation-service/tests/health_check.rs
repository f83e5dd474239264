mod common;

use axum::http::StatusCode;
use common::TestApp;

#[tokio::test]
async fn api_health_reports_ok() {
    let app = TestApp::new();

    let res = app.get("/api/health", None).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "OK");
    assert!(res.body["message"].is_string());
}

#[tokio::test]
async fn probes_check_the_stores() {
    let app = TestApp::new();

    let health = app.get("/health", None).await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.body["service"], "generation-service");

    let ready = app.get("/ready", None).await;
    assert_eq!(ready.status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_routes_get_a_not_found_body() {
    let app = TestApp::new();

    let res = app.get("/api/does-not-exist", None).await;

    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body["error"], "NotFound");
}

#[tokio::test]
async fn responses_carry_security_headers_and_request_id() {
    let app = TestApp::new();

    let response = tower::ServiceExt::oneshot(
        app.router.clone(),
        axum::http::Request::builder()
            .uri("/api/health")
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();

    assert!(response.headers().contains_key("x-content-type-options"));
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn metrics_endpoint_serves_prometheus_text() {
    generation_service::services::metrics::init_metrics();
    let app = TestApp::new();
    app.get("/api/health", None).await;

    let res = app.get("/metrics", None).await;

    assert_eq!(res.status, StatusCode::OK);
    let text = res.body.as_str().unwrap_or_default();
    assert!(text.contains("http_requests_total"));
}
