//! API request and response types

use crate::db::StoredSummary;
use crate::runtime::{CallContext, CallSummary, DiagnosticsSnapshot, TurnReply, TurnTrace};
use crate::state_machine::{CallState, Outcome};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Request to open a call
#[derive(Debug, Deserialize)]
pub struct StartCallRequest {
    /// Generated when absent
    pub session_id: Option<String>,
    pub context: Option<CallContext>,
}

/// Request to process one prospect utterance
#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    pub session_id: String,
    pub prospect_message: String,
}

/// Filter for the stored call listing
#[derive(Debug, Default, Deserialize)]
pub struct CallListQuery {
    pub outcome: Option<Outcome>,
}

/// Agent utterance plus the state it left the call in
#[derive(Debug, Serialize)]
pub struct AgentResponse {
    pub session_id: String,
    pub response: String,
    pub state: CallState,
    pub is_call_over: bool,
    pub trace: TurnTrace,
}

impl AgentResponse {
    pub fn new(session_id: impl Into<String>, reply: TurnReply) -> Self {
        Self {
            session_id: session_id.into(),
            response: reply.reply,
            state: reply.state,
            is_call_over: reply.is_terminal,
            trace: reply.trace,
        }
    }
}

/// Response for ending a call
#[derive(Debug, Serialize)]
pub struct EndCallResponse {
    pub session_id: String,
    pub summary: CallSummary,
}

/// Response with stored calls
#[derive(Debug, Serialize)]
pub struct CallListResponse {
    pub calls: Vec<StoredSummary>,
    /// Stored calls per outcome, ignoring the filter
    pub outcomes: BTreeMap<String, i64>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub active_sessions: usize,
    pub knowledge_backend: &'static str,
    pub model: String,
    pub diagnostics: DiagnosticsSnapshot,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
