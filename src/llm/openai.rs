//! `OpenAI`-compatible chat completions provider (Groq by default)

use super::types::{ContentBlock, LlmMessage, LlmRequest, LlmResponse, Usage};
use super::{LlmError, LlmService};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const GROQ_CHAT_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// OpenAI-compatible service implementation
pub struct OpenAIService {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAIService {
    /// `base_url` is the full chat completions endpoint.
    pub fn new(
        api_key: String,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.into(),
            model: model.into(),
        })
    }

    fn translate_request(&self, request: &LlmRequest) -> OpenAIRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);

        if !request.system.is_empty() {
            messages.push(OpenAIMessage {
                role: "system".to_string(),
                content: Some(request.system_text()),
            });
        }

        messages.extend(request.messages.iter().map(Self::translate_message));

        OpenAIRequest {
            model: self.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_format: request.json_mode.then(|| ResponseFormat {
                r#type: "json_object".to_string(),
            }),
            stream: false,
        }
    }

    fn translate_message(msg: &LlmMessage) -> OpenAIMessage {
        OpenAIMessage {
            role: msg.role.as_str().to_string(),
            content: Some(msg.text()),
        }
    }

    fn normalize_response(resp: OpenAIResponse) -> Result<LlmResponse, LlmError> {
        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::unknown("No choices in response"))?;

        let mut content = Vec::new();
        if let Some(text) = choice.message.content {
            if !text.is_empty() {
                content.push(ContentBlock::Text { text });
            }
        }

        let truncated = choice.finish_reason.as_deref() == Some("length");
        let usage = resp.usage.unwrap_or_default();

        Ok(LlmResponse {
            content,
            truncated,
            usage: Usage {
                input_tokens: u64::from(usage.prompt_tokens),
                output_tokens: u64::from(usage.completion_tokens),
            },
        })
    }

    fn classify_status(status: reqwest::StatusCode, body: &str) -> LlmError {
        if let Ok(error_resp) = serde_json::from_str::<OpenAIErrorResponse>(body) {
            let message = error_resp.error.message;
            return match status.as_u16() {
                401 | 403 => LlmError::auth(format!("Authentication failed: {message}")),
                429 => LlmError::rate_limit(format!("Rate limit exceeded: {message}")),
                400 => LlmError::invalid_request(format!("Invalid request: {message}")),
                500..=599 => LlmError::server_error(format!("Server error: {message}")),
                _ => LlmError::unknown(format!("HTTP {status}: {message}")),
            };
        }
        if status.is_server_error() {
            return LlmError::server_error(format!("HTTP {status} error: {body}"));
        }
        LlmError::unknown(format!("HTTP {status} error: {body}"))
    }
}

#[async_trait]
impl LlmService for OpenAIService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let openai_request = self.translate_request(request);

        let response = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&openai_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::timeout(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    LlmError::network(format!("Connection failed: {e}"))
                } else {
                    LlmError::unknown(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);

        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let err = Self::classify_status(status, &body);
            return Err(match retry_after {
                Some(d) => err.with_retry_after(d),
                None => err,
            });
        }

        let openai_response: OpenAIResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::unknown(format!("Failed to parse response: {e} - body: {body}"))
        })?;

        Self::normalize_response(openai_response)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    r#type: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[allow(clippy::struct_field_names)]
struct OpenAIUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIError,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    message: String,
}
