use generation_service::config::OpenAiConfig;
use generation_service::models::{LengthTier, Tone};
use generation_service::services::gateway::TextGeneration;
use generation_service::services::prompts;
use generation_service::services::providers::{ProviderError, TextProvider};
use generation_service::services::{
    AccountStore, GenerationGateway, InMemoryAccountStore, InMemoryUsageLedger, OpenAiProvider,
    UsageLedger, VerifiedIdentity,
};
use secrecy::Secret;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider_for(server: &MockServer) -> OpenAiProvider {
    let config = OpenAiConfig {
        api_key: Secret::new("sk-test".to_string()),
        model: "gpt-3.5-turbo".to_string(),
        base_url: format!("{}/v1", server.uri()),
    };
    OpenAiProvider::new(&config, 5).unwrap()
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 12, "completion_tokens": 7, "total_tokens": 19 }
    })
}

#[tokio::test]
async fn sends_chat_completion_with_budget_and_reads_the_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-3.5-turbo",
            "max_tokens": 150,
            "messages": [
                { "role": "system" },
                { "role": "user", "content": "Write a haiku" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Autumn moon")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let request = prompts::text_request("Write a haiku", Tone::Casual, LengthTier::Short, "english");

    let response = provider.generate(&request).await.unwrap();

    assert_eq!(response.text, "Autumn moon");
    assert_eq!(response.input_tokens, 12);
    assert_eq!(response.output_tokens, 7);
}

#[tokio::test]
async fn rate_limit_status_maps_to_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let request = prompts::text_request("Hi", Tone::default(), LengthTier::default(), "french");
    let err = provider_for(&server).generate(&request).await.unwrap_err();

    assert!(matches!(err, ProviderError::RateLimited));
}

#[tokio::test]
async fn server_error_maps_to_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let request = prompts::text_request("Hi", Tone::default(), LengthTier::default(), "french");
    let err = provider_for(&server).generate(&request).await.unwrap_err();

    assert!(matches!(err, ProviderError::ApiError(_)));
}

#[tokio::test]
async fn empty_or_garbled_replies_are_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("   ")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let request = prompts::text_request("Hi", Tone::default(), LengthTier::default(), "french");

    assert!(matches!(
        provider.generate(&request).await.unwrap_err(),
        ProviderError::Empty
    ));
    assert!(matches!(
        provider.generate(&request).await.unwrap_err(),
        ProviderError::Malformed(_)
    ));
}

#[tokio::test]
async fn gateway_debits_after_a_real_http_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Bonjour")))
        .mount(&server)
        .await;

    let accounts = Arc::new(InMemoryAccountStore::new());
    let ledger = Arc::new(InMemoryUsageLedger::new());
    let gateway = GenerationGateway::new(
        accounts.clone(),
        ledger.clone(),
        Arc::new(provider_for(&server)),
        Duration::from_secs(5),
    );

    let caller = VerifiedIdentity {
        subject_id: "uid-http".to_string(),
        email: None,
        display_name: None,
    };
    let account = accounts
        .find_or_create_by_external_identity(&caller)
        .await
        .unwrap();

    let outcome = gateway
        .generate_text(
            Some(&caller),
            TextGeneration {
                prompt: "Dis bonjour".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome.content, "Bonjour");
    assert_eq!(outcome.credits_remaining, 4);
    assert_eq!(ledger.count_by_owner(&account.id).await.unwrap(), 1);
}
