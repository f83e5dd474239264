//! Test helpers for generation-service integration tests.
//!
//! Builds the full router over in-memory stores, a static identity verifier
//! and the mock provider. Requests go through `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use generation_service::{
    build_router,
    config::HttpConfig,
    models::Account,
    services::{
        AccountStore, GenerationGateway, InMemoryAccountStore, InMemoryUsageLedger,
        MockTextProvider, StaticIdentityVerifier, VerifiedIdentity,
    },
    AppState,
};
use http_body_util::BodyExt;
use secrecy::Secret;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

pub const TEST_ADMIN_API_KEY: &str = "test-admin-key-12345";

pub struct TestApp {
    pub router: Router,
    pub accounts: Arc<InMemoryAccountStore>,
    pub ledger: Arc<InMemoryUsageLedger>,
    pub provider: Arc<MockTextProvider>,
    pub verifier: Arc<StaticIdentityVerifier>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_provider(MockTextProvider::new())
    }

    pub fn with_provider(provider: MockTextProvider) -> Self {
        Self::with_provider_timeout(provider, Duration::from_secs(2))
    }

    pub fn with_provider_timeout(provider: MockTextProvider, timeout: Duration) -> Self {
        let accounts = Arc::new(InMemoryAccountStore::new());
        let ledger = Arc::new(InMemoryUsageLedger::new());
        let provider = Arc::new(provider);
        let verifier = Arc::new(StaticIdentityVerifier::new());

        let gateway = GenerationGateway::new(
            accounts.clone(),
            ledger.clone(),
            provider.clone(),
            timeout,
        )
        .with_retry_window(Duration::from_millis(200));

        let state = AppState {
            gateway: Arc::new(gateway),
            accounts: accounts.clone(),
            ledger: ledger.clone(),
            verifier: verifier.clone(),
            admin_api_key: Some(Secret::new(TEST_ADMIN_API_KEY.to_string())),
        };

        let router = build_router(state, &HttpConfig::default()).expect("router");

        Self {
            router,
            accounts,
            ledger,
            provider,
            verifier,
        }
    }

    /// Register a bearer token for `subject` without provisioning an account.
    pub fn token_for(&self, subject: &str) -> String {
        let token = format!("token-{}", subject);
        self.verifier.insert(
            &token,
            VerifiedIdentity {
                subject_id: subject.to_string(),
                email: Some(format!("{}@example.com", subject)),
                display_name: Some(format!("User {}", subject)),
            },
        );
        token
    }

    /// Provision an account for `subject` holding `credits`, and return it
    /// with a bearer token that authenticates as it.
    pub async fn signed_in_with_credits(&self, subject: &str, credits: i64) -> (Account, String) {
        let token = self.token_for(subject);
        let identity = VerifiedIdentity {
            subject_id: subject.to_string(),
            email: Some(format!("{}@example.com", subject)),
            display_name: None,
        };
        let account = self
            .accounts
            .find_or_create_by_external_identity(&identity)
            .await
            .expect("provision account");
        self.accounts
            .adjust_balance(&account.id, credits - account.credits)
            .await
            .expect("set balance");

        let account = self.account(&account.id).await;
        (account, token)
    }

    pub async fn account(&self, id: &str) -> Account {
        self.accounts
            .find_by_id(id)
            .await
            .expect("lookup")
            .expect("account exists")
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        TestResponse { status, body }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        self.send(request).await
    }

    pub async fn post_json(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, token, None).await
    }
}
