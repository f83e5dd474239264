mod common;

use axum::http::StatusCode;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::TestApp;
use generation_service::models::{Account, GenerationKind};
use generation_service::services::{
    AccountStore, MockTextProvider, PageRequest, UsageLedger,
};
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn text_generation_debits_one_credit_and_records_usage() {
    let app = TestApp::with_provider(MockTextProvider::replying("Hello"));
    let (account, token) = app.signed_in_with_credits("alice", 5).await;

    let res = app
        .post_json(
            "/api/generate/text",
            Some(&token),
            json!({ "prompt": "Say hello", "tone": "friendly", "length": "short" }),
        )
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["success"], true);
    assert_eq!(res.body["text"], "Hello");
    assert_eq!(res.body["creditsRemaining"], 4);
    assert_eq!(app.account(&account.id).await.credits, 4);

    let records = app
        .ledger
        .list_by_owner(&account.id, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, GenerationKind::Text);
    assert_eq!(records[0].cost, 1);
    assert_eq!(records[0].prompt, "Say hello");
    assert_eq!(records[0].result, "Hello");
}

#[tokio::test]
async fn document_generation_with_too_few_credits_is_rejected_without_side_effects() {
    let app = TestApp::new();
    let (account, token) = app.signed_in_with_credits("bob", 1).await;

    let res = app
        .post_json(
            "/api/generate/document",
            Some(&token),
            json!({ "prompt": "Quarterly report" }),
        )
        .await;

    assert_eq!(res.status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(res.body["error"], "InsufficientCredits");
    assert_eq!(app.account(&account.id).await.credits, 1);
    assert_eq!(app.ledger.count_by_owner(&account.id).await.unwrap(), 0);
    assert_eq!(app.provider.call_count(), 0);
}

#[tokio::test]
async fn provider_timeout_leaves_balance_and_history_untouched() {
    let app = TestApp::with_provider_timeout(
        MockTextProvider::replying("too late").with_delay(Duration::from_millis(500)),
        Duration::from_millis(50),
    );
    let (account, token) = app.signed_in_with_credits("carol", 5).await;

    let res = app
        .post_json("/api/generate/text", Some(&token), json!({ "prompt": "Slow" }))
        .await;

    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.body["error"], "GenerationFailed");
    assert_eq!(res.body["message"], "Content generation failed");
    assert_eq!(app.account(&account.id).await.credits, 5);
    assert_eq!(app.ledger.count_by_owner(&account.id).await.unwrap(), 0);
}

#[tokio::test]
async fn provider_failure_is_reported_generically() {
    let app = TestApp::with_provider(MockTextProvider::failing());
    let (account, token) = app.signed_in_with_credits("dave", 5).await;

    let res = app
        .post_json("/api/generate/text", Some(&token), json!({ "prompt": "Hi" }))
        .await;

    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.body["error"], "GenerationFailed");
    assert_eq!(app.account(&account.id).await.credits, 5);
}

#[tokio::test]
async fn generate_endpoints_require_a_bearer_credential() {
    let app = TestApp::new();

    for uri in [
        "/api/generate/text",
        "/api/generate/document",
        "/api/generate/pdf",
    ] {
        let res = app.post_json(uri, None, json!({ "prompt": "Hi" })).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(res.body["error"], "MissingCredential", "{}", uri);
    }

    let res = app.get("/api/generate/history", None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["error"], "MissingCredential");
    assert_eq!(app.provider.call_count(), 0);
}

#[tokio::test]
async fn unknown_token_is_an_invalid_credential() {
    let app = TestApp::new();

    let res = app
        .post_json(
            "/api/generate/text",
            Some("forged-token"),
            json!({ "prompt": "Hi" }),
        )
        .await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["error"], "InvalidCredential");
}

#[tokio::test]
async fn caller_without_an_account_gets_not_found() {
    let app = TestApp::new();
    let token = app.token_for("nobody");

    let res = app
        .post_json("/api/generate/text", Some(&token), json!({ "prompt": "Hi" }))
        .await;

    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body["error"], "AccountNotFound");
    assert_eq!(app.provider.call_count(), 0);
}

#[tokio::test]
async fn disabled_account_is_forbidden() {
    let app = TestApp::new();
    let token = app.token_for("banned");
    let mut account = Account::with_external_identity("firebase", "banned", None, None);
    account.is_active = false;
    app.accounts.create(account).await.unwrap();

    let res = app
        .post_json("/api/generate/text", Some(&token), json!({ "prompt": "Hi" }))
        .await;

    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.body["error"], "AccountDisabled");
}

#[tokio::test]
async fn pdf_alias_returns_content_and_simulated_document() {
    let app = TestApp::with_provider(MockTextProvider::replying("# Title\n\nBody"));
    let (account, token) = app.signed_in_with_credits("erin", 5).await;

    let res = app
        .post_json(
            "/api/generate/pdf",
            Some(&token),
            json!({ "prompt": "A memo", "design": "academic" }),
        )
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["content"], "# Title\n\nBody");
    assert_eq!(res.body["creditsRemaining"], 3);

    let url = res.body["pdfUrl"].as_str().unwrap();
    let encoded = url.strip_prefix("data:text/plain;base64,").unwrap();
    let decoded = String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap();
    assert_eq!(decoded, "PDF Simulation: # Title\n\nBody");

    let records = app
        .ledger
        .list_by_owner(&account.id, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(records[0].kind, GenerationKind::Document);
    assert_eq!(records[0].cost, 2);
}

#[tokio::test]
async fn blank_or_missing_prompt_is_a_validation_error() {
    let app = TestApp::new();
    let (account, token) = app.signed_in_with_credits("frank", 5).await;

    for body in [json!({}), json!({ "prompt": "" }), json!({ "prompt": "   " })] {
        let res = app
            .post_json("/api/generate/text", Some(&token), body.clone())
            .await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST, "{}", body);
        assert_eq!(res.body["error"], "ValidationFailed", "{}", body);
    }

    assert_eq!(app.account(&account.id).await.credits, 5);
    assert_eq!(app.provider.call_count(), 0);
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
    let app = TestApp::new();
    let (_, token) = app.signed_in_with_credits("gina", 5).await;

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/generate/text")
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let res = app.send(request).await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["error"], "ValidationFailed");
}

#[tokio::test]
async fn unknown_parameters_fall_back_to_defaults() {
    let app = TestApp::new();
    let (account, token) = app.signed_in_with_credits("hank", 5).await;

    let res = app
        .post_json(
            "/api/generate/text",
            Some(&token),
            json!({ "prompt": "Hi", "tone": "sarcastic", "length": "epic" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let history = app.get("/api/generate/history", Some(&token)).await;
    let params = &history.body["records"][0]["parameters"];
    assert_eq!(params["tone"], "professional");
    assert_eq!(params["length"], "medium");
    assert_eq!(params["language"], "french");

    let requests = app.provider.requests();
    assert_eq!(requests[0].params.max_tokens, 300);
    assert_eq!(app.account(&account.id).await.credits, 4);
}

#[tokio::test]
async fn failed_usage_append_refunds_the_debit() {
    let app = TestApp::new();
    let (account, token) = app.signed_in_with_credits("ivy", 5).await;
    app.ledger.set_append_failure(true);

    let res = app
        .post_json("/api/generate/text", Some(&token), json!({ "prompt": "Hi" }))
        .await;

    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.body["error"], "PersistenceFailed");
    assert_eq!(app.account(&account.id).await.credits, 5);
    assert!(app.ledger.append_attempts() >= 1);
}

#[tokio::test]
async fn concurrent_requests_never_overspend() {
    let app = TestApp::with_provider(
        MockTextProvider::replying("ok").with_delay(Duration::from_millis(20)),
    );
    let (account, token) = app.signed_in_with_credits("jack", 3).await;

    let requests = (0..6).map(|i| {
        let app = &app;
        let token = token.clone();
        async move {
            app.post_json(
                "/api/generate/text",
                Some(&token),
                json!({ "prompt": format!("request {}", i) }),
            )
            .await
        }
    });
    let responses = futures::future::join_all(requests).await;

    let ok = responses
        .iter()
        .filter(|r| r.status == StatusCode::OK)
        .count();
    let rejected = responses
        .iter()
        .filter(|r| r.status == StatusCode::PAYMENT_REQUIRED)
        .count();

    assert_eq!(ok, 3);
    assert_eq!(rejected, 3);
    assert_eq!(app.account(&account.id).await.credits, 0);
    assert_eq!(app.ledger.count_by_owner(&account.id).await.unwrap(), 3);
}
