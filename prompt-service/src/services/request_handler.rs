//! Request orchestration: validate, persist, generate, complete.
//!
//! A valid request always leaves exactly one record behind. The record is
//! written before the provider is called and completed only if the provider
//! returns usable text; failed generations keep their input-only record.

use crate::models::{Record, Variant};
use crate::services::metrics::{record_prompt_request, record_provider_error, record_provider_latency};
use crate::services::providers::{GenerationParams, ProviderError, TextProvider};
use crate::services::store::{RecordStore, StoreError};
use service_core::error::AppError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Longest accepted input, in characters.
pub const MAX_INPUT_CHARS: usize = 32_768;

/// Errors surfaced by [`RequestHandler::handle`].
#[derive(Error, Debug)]
pub enum HandlerError {
    /// Input missing, blank or too long. Nothing was persisted.
    #[error("{0}")]
    InvalidInput(String),

    /// The provider failed or produced no text. The record keeps no output.
    #[error("Generation failed: {source}")]
    GenerationFailed {
        record_id: i64,
        #[source]
        source: ProviderError,
    },

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl From<HandlerError> for AppError {
    fn from(err: HandlerError) -> Self {
        match err {
            HandlerError::InvalidInput(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            HandlerError::GenerationFailed { .. } => AppError::UpstreamError(err.to_string()),
            HandlerError::Storage(StoreError::Backend(msg)) => {
                AppError::DatabaseError(anyhow::anyhow!(msg))
            }
            HandlerError::Storage(e @ StoreError::NotFound { .. }) => {
                AppError::InternalError(anyhow::Error::new(e))
            }
        }
    }
}

/// Successful generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub record_id: i64,
    pub output_text: String,
}

/// Orchestrates one variant: its store, the shared provider, and call limits.
#[derive(Clone)]
pub struct RequestHandler {
    variant: Variant,
    store: Arc<dyn RecordStore>,
    provider: Arc<dyn TextProvider>,
    params: GenerationParams,
    timeout: Duration,
}

impl RequestHandler {
    pub fn new(
        variant: Variant,
        store: Arc<dyn RecordStore>,
        provider: Arc<dyn TextProvider>,
        params: GenerationParams,
        timeout: Duration,
    ) -> Self {
        Self {
            variant,
            store,
            provider,
            params,
            timeout,
        }
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Read access to the records this handler writes.
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn provider(&self) -> &Arc<dyn TextProvider> {
        &self.provider
    }

    #[tracing::instrument(skip(self, input_text), fields(variant = %self.variant))]
    pub async fn handle(&self, input_text: &str) -> Result<Generation, HandlerError> {
        let result = self.run(input_text).await;

        let outcome = match &result {
            Ok(_) => "completed",
            Err(HandlerError::InvalidInput(_)) => "invalid_input",
            Err(HandlerError::GenerationFailed { .. }) => "generation_failed",
            Err(HandlerError::Storage(_)) => "storage_error",
        };
        record_prompt_request(self.variant.as_str(), outcome);

        result
    }

    async fn run(&self, input_text: &str) -> Result<Generation, HandlerError> {
        self.validate(input_text)?;

        let record = self.store.create(input_text).await?;
        tracing::info!(record_id = record.id, "Record created, calling provider");

        let text = match self.generate(&record).await {
            Ok(text) => text,
            Err(source) => {
                record_provider_error(self.provider.name(), source.kind());
                tracing::warn!(
                    record_id = record.id,
                    provider = self.provider.name(),
                    error = %source,
                    "Generation failed, record left without output"
                );
                return Err(HandlerError::GenerationFailed {
                    record_id: record.id,
                    source,
                });
            }
        };

        let completed = self.store.update_output(record.id, &text).await?;
        tracing::info!(
            record_id = completed.id,
            output_len = text.len(),
            "Generation completed"
        );

        Ok(Generation {
            record_id: completed.id,
            output_text: text,
        })
    }

    fn validate(&self, input_text: &str) -> Result<(), HandlerError> {
        let field = self.variant.input_field();

        if input_text.trim().is_empty() {
            return Err(HandlerError::InvalidInput(format!(
                "{} must be a non-empty string",
                field
            )));
        }

        if input_text.chars().count() > MAX_INPUT_CHARS {
            return Err(HandlerError::InvalidInput(format!(
                "{} must be at most {} characters",
                field, MAX_INPUT_CHARS
            )));
        }

        // PostgreSQL TEXT cannot hold NUL
        if input_text.contains('\0') {
            return Err(HandlerError::InvalidInput(format!(
                "{} must not contain NUL characters",
                field
            )));
        }

        Ok(())
    }

    /// Single attempt, bounded by the configured timeout.
    async fn generate(&self, record: &Record) -> Result<String, ProviderError> {
        let prompt = self.variant.render_prompt(&record.input_text);
        let start = Instant::now();

        let response = tokio::time::timeout(self.timeout, self.provider.generate(&prompt, &self.params))
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))?;

        record_provider_latency(
            self.provider.name(),
            self.provider.model(),
            start.elapsed().as_secs_f64(),
        );

        let response = response?;
        tracing::debug!(
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            finish_reason = ?response.finish_reason,
            "Provider responded"
        );

        response
            .text
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ProviderError::ApiError("Provider returned no text".to_string()))
    }
}
