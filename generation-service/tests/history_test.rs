mod common;

use axum::http::StatusCode;
use chrono::{Duration as ChronoDuration, Utc};
use common::TestApp;
use generation_service::models::{DocumentDesign, UsageParameters, UsageRecord};
use generation_service::services::UsageLedger;

async fn seed(app: &TestApp, account_id: &str, count: usize) {
    let base = Utc::now();
    for i in 0..count {
        let mut record = UsageRecord::new(
            account_id,
            &format!("prompt {}", i),
            format!("result {}", i),
            UsageParameters::Document {
                design: DocumentDesign::Minimal,
            },
        );
        record.created_at = base - ChronoDuration::minutes((count - i) as i64);
        app.ledger.append(&record).await.unwrap();
    }
}

#[tokio::test]
async fn history_is_paginated_newest_first() {
    let app = TestApp::new();
    let (account, token) = app.signed_in_with_credits("alice", 5).await;
    seed(&app, &account.id, 23).await;

    let res = app
        .get("/api/generate/history?page=1&limit=10", Some(&token))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["pagination"]["total"], 23);
    assert_eq!(res.body["pagination"]["pages"], 3);

    let records = res.body["records"].as_array().unwrap();
    assert_eq!(records.len(), 10);
    assert_eq!(records[0]["prompt"], "prompt 22");
    assert_eq!(records[9]["prompt"], "prompt 13");
    assert_eq!(records[0]["type"], "pdf");
    assert_eq!(records[0]["creditsUsed"], 2);

    let last = app
        .get("/api/generate/history?page=3&limit=10", Some(&token))
        .await;
    let records = last.body["records"].as_array().unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[2]["prompt"], "prompt 0");
}

#[tokio::test]
async fn exactly_full_last_page_holds_a_whole_page() {
    let app = TestApp::new();
    let (account, token) = app.signed_in_with_credits("hana", 5).await;
    seed(&app, &account.id, 20).await;

    let last = app
        .get("/api/generate/history?page=2&limit=10", Some(&token))
        .await;
    assert_eq!(last.status, StatusCode::OK);
    assert_eq!(last.body["pagination"]["total"], 20);
    assert_eq!(last.body["pagination"]["pages"], 2);

    let records = last.body["records"].as_array().unwrap();
    assert_eq!(records.len(), 10);
    assert_eq!(records[0]["prompt"], "prompt 9");
    assert_eq!(records[9]["prompt"], "prompt 0");

    let beyond = app
        .get("/api/generate/history?page=3&limit=10", Some(&token))
        .await;
    assert!(beyond.body["records"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn page_past_the_end_is_empty() {
    let app = TestApp::new();
    let (account, token) = app.signed_in_with_credits("bob", 5).await;
    seed(&app, &account.id, 4).await;

    let res = app
        .get("/api/generate/history?page=7&limit=2", Some(&token))
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body["records"].as_array().unwrap().is_empty());
    assert_eq!(res.body["pagination"]["pages"], 2);
    assert_eq!(res.body["pagination"]["page"], 7);
}

#[tokio::test]
async fn invalid_paging_values_fall_back_to_defaults() {
    let app = TestApp::new();
    let (account, token) = app.signed_in_with_credits("carol", 5).await;
    seed(&app, &account.id, 12).await;

    let res = app
        .get("/api/generate/history?page=abc&limit=-4", Some(&token))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["pagination"]["page"], 1);
    assert_eq!(res.body["pagination"]["limit"], 10);
    assert_eq!(res.body["records"].as_array().unwrap().len(), 10);

    let capped = app
        .get("/api/generate/history?limit=5000", Some(&token))
        .await;
    assert_eq!(capped.body["pagination"]["limit"], 100);
    assert_eq!(capped.body["pagination"]["pages"], 1);
}

#[tokio::test]
async fn history_only_lists_the_callers_records() {
    let app = TestApp::new();
    let (alice, alice_token) = app.signed_in_with_credits("alice", 5).await;
    let (bob, _) = app.signed_in_with_credits("bob", 5).await;
    seed(&app, &alice.id, 2).await;
    seed(&app, &bob.id, 5).await;

    let res = app.get("/api/generate/history", Some(&alice_token)).await;

    assert_eq!(res.body["pagination"]["total"], 2);
    assert_eq!(res.body["records"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn empty_history_has_zero_pages() {
    let app = TestApp::new();
    let (_, token) = app.signed_in_with_credits("dave", 5).await;

    let res = app.get("/api/generate/history", Some(&token)).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["pagination"]["total"], 0);
    assert_eq!(res.body["pagination"]["pages"], 0);
}

#[tokio::test]
async fn listing_twice_returns_the_same_page() {
    let app = TestApp::new();
    let (account, token) = app.signed_in_with_credits("erin", 5).await;
    seed(&app, &account.id, 6).await;

    let first = app
        .get("/api/generate/history?page=2&limit=4", Some(&token))
        .await;
    let second = app
        .get("/api/generate/history?page=2&limit=4", Some(&token))
        .await;

    assert_eq!(first.body, second.body);
}
