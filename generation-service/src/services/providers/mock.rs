//! Mock provider for tests and local development.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{ProviderError, ProviderRequest, ProviderResponse, TextProvider};

enum Behaviour {
    Echo,
    Reply(String),
    Fail,
    Empty,
}

/// Deterministic text provider. Records every request it receives.
pub struct MockTextProvider {
    behaviour: Behaviour,
    delay: Option<Duration>,
    calls: AtomicUsize,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl MockTextProvider {
    /// Replies with `Mock response for: <prompt>`.
    pub fn new() -> Self {
        Self::with_behaviour(Behaviour::Echo)
    }

    pub fn replying(text: &str) -> Self {
        Self::with_behaviour(Behaviour::Reply(text.to_string()))
    }

    /// Every call fails with an upstream API error.
    pub fn failing() -> Self {
        Self::with_behaviour(Behaviour::Fail)
    }

    /// Every call returns an empty completion.
    pub fn empty() -> Self {
        Self::with_behaviour(Behaviour::Empty)
    }

    /// Sleep before answering, to exercise timeouts and concurrency.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn with_behaviour(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            delay: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl Default for MockTextProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextProvider for MockTextProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn generate(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let text = match &self.behaviour {
            Behaviour::Echo => format!("Mock response for: {}", request.user_prompt),
            Behaviour::Reply(text) => text.clone(),
            Behaviour::Fail => {
                return Err(ProviderError::ApiError("mock provider failure".to_string()))
            }
            Behaviour::Empty => return Err(ProviderError::Empty),
        };

        Ok(ProviderResponse {
            input_tokens: (request.user_prompt.len() / 4) as u32,
            output_tokens: (text.len() / 4) as u32,
            text,
        })
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        match self.behaviour {
            Behaviour::Fail => Err(ProviderError::NotConfigured(
                "mock provider set to fail".to_string(),
            )),
            _ => Ok(()),
        }
    }
}
