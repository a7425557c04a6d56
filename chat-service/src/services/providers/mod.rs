//! Chat completion provider abstractions and implementations.
//!
//! Handlers talk to a [`CompletionProvider`] so the OpenAI client can be
//! swapped for the mock in tests and local runs.

pub mod mock;
pub mod openai;

pub use mock::MockCompletionProvider;
pub use openai::OpenAiCompletionProvider;

use crate::models::Turn;
use async_trait::async_trait;
use thiserror::Error;

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("{0}")]
    ApiError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Completion contained no reply text")]
    EmptyResponse,
}

impl ProviderError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::NotConfigured(_) => "not_configured",
            ProviderError::ApiError(_) => "api_error",
            ProviderError::RateLimited(_) => "rate_limited",
            ProviderError::NetworkError(_) => "network_error",
            ProviderError::EmptyResponse => "empty_response",
        }
    }
}

/// A single completion returned by a provider.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Assistant reply text.
    pub text: String,

    /// Prompt tokens consumed, when reported.
    pub input_tokens: u32,

    /// Completion tokens generated, when reported.
    pub output_tokens: u32,

    pub finish_reason: FinishReason,
}

/// Reason why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Complete,
    Length,
    ContentFilter,
    Other,
}

impl FinishReason {
    pub fn from_api(reason: Option<&str>) -> Self {
        match reason {
            Some("stop") | None => FinishReason::Complete,
            Some("length") => FinishReason::Length,
            Some("content_filter") => FinishReason::ContentFilter,
            Some(_) => FinishReason::Other,
        }
    }
}

/// Trait for chat completion backends.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Model identifier sent with each request.
    fn model(&self) -> &str;

    /// Request one completion for the full ordered turn history.
    async fn complete(&self, turns: &[Turn]) -> Result<Completion, ProviderError>;
}
