//! Content provider abstraction.
//!
//! The gateway talks to a [`TextProvider`]; production uses an
//! OpenAI-compatible chat completions API, tests use the mock.

pub mod mock;
pub mod openai;

use async_trait::async_trait;
use thiserror::Error;

pub use mock::MockTextProvider;
pub use openai::OpenAiProvider;

/// Sampling temperature used for every generation.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timed out after {0}s")]
    Timeout(u64),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Empty response")]
    Empty,
}

impl ProviderError {
    /// Label used in metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            ProviderError::NotConfigured(_) => "not_configured",
            ProviderError::ApiError(_) => "api_error",
            ProviderError::RateLimited => "rate_limited",
            ProviderError::NetworkError(_) => "network",
            ProviderError::Timeout(_) => "timeout",
            ProviderError::Malformed(_) => "malformed",
            ProviderError::Empty => "empty",
        }
    }
}

/// Generation parameters for a provider call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    /// Maximum output tokens.
    pub max_tokens: u32,

    pub temperature: f32,
}

/// One chat exchange: a system instruction and the caller's prompt.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub params: GenerationParams,
}

/// Result of a provider call.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub text: String,

    /// Input tokens consumed, when reported.
    pub input_tokens: u32,

    /// Output tokens generated, when reported.
    pub output_tokens: u32,
}

#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Provider name for logs and metrics.
    fn name(&self) -> &str;

    /// Model identifier sent upstream.
    fn model(&self) -> &str;

    /// Generate a completion. Implementations never retry.
    async fn generate(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderError>;

    /// Health check.
    async fn health_check(&self) -> Result<(), ProviderError>;
}
