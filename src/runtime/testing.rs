//! Mock implementations for testing
//!
//! These mocks enable orchestrator and API tests without real I/O.

use super::session::CallSummary;
use super::traits::*;
use crate::knowledge::{
    KeywordRetriever, KnowledgeBase, KnowledgeFusion, RetrievedEntry, Retriever, DEFAULT_TOP_K,
};
use crate::llm::{ContentBlock, LlmError, LlmRequest, LlmResponse, Usage};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Response helpers
// ============================================================================

/// Completion whose text is the structured reply the prompt asks for
pub fn json_reply(trigger: &str, response: &str) -> LlmResponse {
    text_response(
        &serde_json::json!({
            "trigger": trigger,
            "response": response,
            "internal_reasoning": "test",
        })
        .to_string(),
    )
}

/// Completion with arbitrary text
pub fn text_response(text: &str) -> LlmResponse {
    LlmResponse {
        content: if text.is_empty() {
            Vec::new()
        } else {
            vec![ContentBlock::text(text)]
        },
        truncated: false,
        usage: Usage::default(),
    }
}

/// Keyword-backed fusion over `base`
pub fn fusion_over(base: KnowledgeBase) -> KnowledgeFusion {
    let base = Arc::new(base);
    let retriever: Arc<dyn Retriever> = Arc::new(KeywordRetriever::new(base.clone()));
    KnowledgeFusion::new(base, retriever, DEFAULT_TOP_K)
}

// ============================================================================
// Mock LLM Client
// ============================================================================

/// Mock LLM client that returns queued responses
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    model_id: String,
    /// Record of all requests made
    pub requests: Mutex<Vec<LlmRequest>>,
}

#[allow(dead_code)]
impl MockLlmClient {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response
    pub fn queue_response(&self, response: LlmResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// Slow LLM Client (for timeout testing)
// ============================================================================

/// LLM client that sleeps before answering
pub struct SlowLlmClient {
    delay: Duration,
}

impl SlowLlmClient {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl LlmClient for SlowLlmClient {
    async fn complete(&self, _request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        tokio::time::sleep(self.delay).await;
        Ok(json_reply("NONE", "Sorry for the wait."))
    }

    fn model_id(&self) -> &str {
        "slow-mock"
    }
}

// ============================================================================
// Mock Retriever
// ============================================================================

/// Retriever returning a fixed result list regardless of the query
pub struct StaticRetriever {
    results: Vec<RetrievedEntry>,
}

impl StaticRetriever {
    pub fn new(results: Vec<RetrievedEntry>) -> Self {
        Self { results }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

impl Retriever for StaticRetriever {
    fn retrieve(&self, _query: &str, categories: &[String], top_k: usize) -> Vec<RetrievedEntry> {
        self.results
            .iter()
            .filter(|e| categories.iter().any(|c| *c == e.category))
            .take(top_k)
            .cloned()
            .collect()
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

// ============================================================================
// In-memory Summary Store
// ============================================================================

/// Summary store that keeps everything in memory
#[derive(Default)]
pub struct MemorySummaryStore {
    saved: Mutex<Vec<(String, CallSummary)>>,
}

impl MemorySummaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saved(&self) -> Vec<(String, CallSummary)> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl SummaryStore for MemorySummaryStore {
    async fn save_summary(&self, session_id: &str, summary: &CallSummary) -> Result<(), String> {
        self.saved
            .lock()
            .unwrap()
            .push((session_id.to_string(), summary.clone()));
        Ok(())
    }
}
