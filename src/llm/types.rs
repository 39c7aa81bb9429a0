//! Common types for LLM interactions

use serde::{Deserialize, Serialize};

/// LLM request
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub system: Vec<SystemContent>,
    pub messages: Vec<LlmMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Ask the provider to constrain output to a single JSON object
    pub json_mode: bool,
}

impl LlmRequest {
    pub fn new(system: Vec<SystemContent>, messages: Vec<LlmMessage>) -> Self {
        Self {
            system,
            messages,
            max_tokens: None,
            temperature: None,
            json_mode: false,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }

    /// All system text joined the way providers receive it
    pub fn system_text(&self) -> String {
        self.system
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// System prompt content
#[derive(Debug, Clone)]
pub struct SystemContent {
    pub text: String,
}

impl SystemContent {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Message in conversation
#[derive(Debug, Clone)]
pub struct LlmMessage {
    pub role: MessageRole,
    pub content: Vec<ContentBlock>,
}

impl LlmMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: vec![ContentBlock::text(text)],
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: vec![ContentBlock::text(text)],
        }
    }

    pub fn text(&self) -> String {
        self.content
            .iter()
            .map(|ContentBlock::Text { text }| text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// Content block in a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
}

impl ContentBlock {
    pub fn text(s: impl Into<String>) -> Self {
        ContentBlock::Text { text: s.into() }
    }
}

/// LLM response
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    /// Generation stopped at the token limit
    pub truncated: bool,
    pub usage: Usage,
}

impl LlmResponse {
    /// Get text content from the response
    pub fn text(&self) -> String {
        self.content
            .iter()
            .map(|ContentBlock::Text { text }| text.as_str())
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Usage statistics
#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}
