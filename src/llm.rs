//! Generation backend abstraction
//!
//! The call engine only needs chat completion with an optional JSON-object
//! constraint. One OpenAI-compatible provider is implemented.

mod error;
mod openai;
mod types;

pub use error::{LlmError, LlmErrorKind};
pub use openai::{OpenAIService, DEFAULT_MODEL, GROQ_CHAT_URL};
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

/// Common interface for LLM providers
#[async_trait]
pub trait LlmService: Send + Sync {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    fn model_id(&self) -> &str;
}

/// Decorator that logs every completion with its timing, size and usage
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let start = Instant::now();
        let result = self.inner.complete(request).await;
        let duration_ms = start.elapsed().as_millis();

        match &result {
            Ok(response) if response.truncated => {
                // A cut-off JSON reply will not parse downstream
                tracing::warn!(
                    model = %self.model_id,
                    duration_ms = %duration_ms,
                    max_tokens = ?request.max_tokens,
                    output_tokens = response.usage.output_tokens,
                    "Completion hit the token limit"
                );
            }
            Ok(response) => {
                tracing::info!(
                    model = %self.model_id,
                    duration_ms = %duration_ms,
                    messages = request.messages.len(),
                    json_mode = request.json_mode,
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    "Completion finished"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    duration_ms = %duration_ms,
                    error = %e.message,
                    kind = e.kind.as_str(),
                    retryable = e.kind.is_retryable(),
                    retry_after_ms = ?e.retry_after.map(|d| d.as_millis()),
                    "Completion failed"
                );
            }
        }

        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FixedService {
        result: Mutex<Option<Result<LlmResponse, LlmError>>>,
    }

    #[async_trait]
    impl LlmService for FixedService {
        async fn complete(&self, _request: &LlmRequest) -> Result<LlmResponse, LlmError> {
            self.result
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(LlmError::unknown("exhausted")))
        }

        fn model_id(&self) -> &str {
            "fixed-model"
        }
    }

    fn logged(result: Result<LlmResponse, LlmError>) -> LoggingService {
        LoggingService::new(Arc::new(FixedService {
            result: Mutex::new(Some(result)),
        }))
    }

    fn request() -> LlmRequest {
        LlmRequest::new(vec![SystemContent::new("sys")], vec![LlmMessage::user("hi")])
            .with_max_tokens(10)
            .json()
    }

    #[tokio::test]
    async fn test_passes_responses_through() {
        let service = logged(Ok(LlmResponse {
            content: vec![ContentBlock::text("{\"trigger\":\"NONE\"}")],
            truncated: true,
            usage: Usage {
                input_tokens: 5,
                output_tokens: 10,
            },
        }));

        assert_eq!(service.model_id(), "fixed-model");
        let response = service.complete(&request()).await.unwrap();
        assert!(response.truncated);
        assert_eq!(response.text(), "{\"trigger\":\"NONE\"}");
    }

    #[tokio::test]
    async fn test_passes_errors_through() {
        let service = logged(Err(LlmError::rate_limit("slow down")));
        let err = service.complete(&request()).await.unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::RateLimit);
    }
}
