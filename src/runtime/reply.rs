//! Parsing of the generation backend's structured reply

use crate::llm::LlmError;
use crate::state_machine::TriggerLabel;
use serde::Deserialize;
use thiserror::Error;

/// Spoken when the backend answered but the reply had nothing usable
pub const REPEAT_REPLY: &str = "I'm sorry, could you repeat that?";

/// Spoken when the backend could not be reached
pub const UNAVAILABLE_REPLY: &str =
    "I'm having a brief technical issue. Could you give me one moment?";

/// Recoverable problems with one generation call. None of them reach the caller.
#[derive(Debug, Error)]
pub enum GenerationFault {
    #[error("Unrecognized trigger label: {0}")]
    UnrecognizedTrigger(String),
    #[error("Malformed generation output: {0}")]
    MalformedOutput(String),
    #[error("Generation unavailable: {0}")]
    Unavailable(#[from] LlmError),
}

impl GenerationFault {
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationFault::UnrecognizedTrigger(_) => "unrecognized_trigger",
            GenerationFault::MalformedOutput(_) => "malformed_output",
            GenerationFault::Unavailable(_) => "unavailable",
        }
    }
}

/// Wire shape the prompt asks for
#[derive(Debug, Deserialize)]
struct WireReply {
    #[serde(default)]
    trigger: Option<String>,
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    internal_reasoning: Option<String>,
}

/// Structured agent reply for one turn
#[derive(Debug, Clone, PartialEq)]
pub struct AgentReply {
    pub label: TriggerLabel,
    pub response: String,
    pub internal_reasoning: String,
}

impl AgentReply {
    /// Parse the raw completion text.
    ///
    /// A missing trigger means no transition; a missing or blank response
    /// falls back to [`REPEAT_REPLY`]. Anything that is not a JSON object with
    /// string fields is `MalformedOutput`.
    pub fn parse(raw: &str) -> Result<Self, GenerationFault> {
        let wire: WireReply = serde_json::from_str(raw.trim())
            .map_err(|e| GenerationFault::MalformedOutput(e.to_string()))?;

        let label = TriggerLabel::parse(wire.trigger.as_deref().unwrap_or_default());
        let response = wire
            .response
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| REPEAT_REPLY.to_string());

        Ok(Self {
            label,
            response,
            internal_reasoning: wire.internal_reasoning.unwrap_or_default(),
        })
    }

    /// Reply used when the completion was not valid structured output.
    /// Plain text is spoken as-is; nothing triggers.
    pub fn from_malformed(raw: &str) -> Self {
        let text = raw.trim();
        Self {
            label: TriggerLabel::NoTransition,
            response: if text.is_empty() {
                REPEAT_REPLY.to_string()
            } else {
                text.to_string()
            },
            internal_reasoning: "Failed to parse JSON from LLM response.".to_string(),
        }
    }

    pub fn unavailable(error: &LlmError) -> Self {
        Self {
            label: TriggerLabel::NoTransition,
            response: UNAVAILABLE_REPLY.to_string(),
            internal_reasoning: format!("LLM call failed: {error}"),
        }
    }
}
