//! Database schema and types

use crate::runtime::CallSummary;
use crate::state_machine::Outcome;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS call_summaries (
    session_id TEXT PRIMARY KEY,
    prospect_name TEXT NOT NULL,
    prospect_company TEXT NOT NULL,
    outcome TEXT NOT NULL,
    total_turns INTEGER NOT NULL,
    summary TEXT NOT NULL,
    completed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_call_summaries_completed ON call_summaries(completed_at DESC);
CREATE INDEX IF NOT EXISTS idx_call_summaries_outcome ON call_summaries(outcome);
";

/// A finished call as stored
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredSummary {
    pub session_id: String,
    pub outcome: Outcome,
    pub completed_at: DateTime<Utc>,
    pub summary: CallSummary,
}
