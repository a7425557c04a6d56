//! Mock completion provider for testing and local runs.

use super::{Completion, CompletionProvider, FinishReason, ProviderError};
use crate::models::{Role, Turn};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

const MOCK_MODEL: &str = "mock-chat";

/// Echoes the latest user turn back, or fails with a fixed message.
pub struct MockCompletionProvider {
    failure: Option<String>,
    calls: AtomicUsize,
    last_request: Mutex<Option<Vec<Turn>>>,
}

impl MockCompletionProvider {
    pub fn new() -> Self {
        Self {
            failure: None,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// A provider whose every call fails with `ApiError(message)`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::new()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Turns sent with the most recent call.
    pub async fn last_request(&self) -> Option<Vec<Turn>> {
        self.last_request.lock().await.clone()
    }
}

impl Default for MockCompletionProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionProvider for MockCompletionProvider {
    fn model(&self) -> &str {
        MOCK_MODEL
    }

    async fn complete(&self, turns: &[Turn]) -> Result<Completion, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().await = Some(turns.to_vec());

        if let Some(message) = &self.failure {
            return Err(ProviderError::ApiError(message.clone()));
        }

        let prompt = turns
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.content.as_str())
            .unwrap_or_default();

        Ok(Completion {
            text: format!("Mock reply to: {}", prompt),
            input_tokens: estimate_tokens(turns.iter().map(|t| t.content.len())),
            output_tokens: 5,
            finish_reason: FinishReason::Complete,
        })
    }
}

/// Rough token count (four bytes per token), saturating at `u32::MAX`.
fn estimate_tokens(lengths: impl IntoIterator<Item = usize>) -> u32 {
    lengths.into_iter().fold(0u32, |total, len| {
        total.saturating_add(u32::try_from(len / 4).unwrap_or(u32::MAX))
    })
}
