//! Mock provider implementation for testing and local runs.

use super::{FinishReason, GenerationParams, ProviderError, ProviderResponse, TextProvider};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// What the mock returns from `generate`.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// `"Mock response for: <prompt>"`.
    Echo,
    /// Always the given text.
    Fixed(String),
    /// A response with no text.
    Empty,
    /// An API error with the given message.
    Fail(String),
    /// Sleep, then echo. Used to exercise timeouts.
    Delay(Duration),
}

/// Mock text provider.
pub struct MockTextProvider {
    behavior: MockBehavior,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockTextProvider {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn echo() -> Self {
        Self::new(MockBehavior::Echo)
    }

    pub fn fixed(text: impl Into<String>) -> Self {
        Self::new(MockBehavior::Fixed(text.into()))
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::new(MockBehavior::Fail(message.into()))
    }

    /// Number of `generate` calls received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    fn respond(text: Option<String>, prompt: &str) -> ProviderResponse {
        ProviderResponse {
            output_tokens: text.as_ref().map(|t| t.len() as i32 / 4).unwrap_or(0),
            text,
            input_tokens: prompt.len() as i32 / 4,
            finish_reason: FinishReason::Complete,
        }
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

    async fn generate(
        &self,
        prompt: &str,
        _params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        match &self.behavior {
            MockBehavior::Echo => Ok(Self::respond(
                Some(format!("Mock response for: {}", prompt)),
                prompt,
            )),
            MockBehavior::Fixed(text) => Ok(Self::respond(Some(text.clone()), prompt)),
            MockBehavior::Empty => Ok(Self::respond(None, prompt)),
            MockBehavior::Fail(message) => Err(ProviderError::ApiError(message.clone())),
            MockBehavior::Delay(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(Self::respond(
                    Some(format!("Mock response for: {}", prompt)),
                    prompt,
                ))
            }
        }
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}
