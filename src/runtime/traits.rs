//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the orchestrator with mock implementations.

use super::session::CallSummary;
use crate::db::Database;
use crate::llm::{LlmError, LlmRequest, LlmResponse, LlmService};
use async_trait::async_trait;
use std::sync::Arc;

/// Client for making LLM requests
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Complete an LLM request
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Storage for finished call summaries
#[async_trait]
pub trait SummaryStore: Send + Sync {
    async fn save_summary(&self, session_id: &str, summary: &CallSummary) -> Result<(), String>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for Arc<T> {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        (**self).complete(request).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

#[async_trait]
impl<T: SummaryStore + ?Sized> SummaryStore for Arc<T> {
    async fn save_summary(&self, session_id: &str, summary: &CallSummary) -> Result<(), String> {
        (**self).save_summary(session_id, summary).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use an `LlmService` as `LlmClient`
pub struct ServiceLlmClient {
    service: Arc<dyn LlmService>,
    model_id: String,
}

impl ServiceLlmClient {
    pub fn new(service: Arc<dyn LlmService>) -> Self {
        let model_id = service.model_id().to_string();
        Self { service, model_id }
    }
}

#[async_trait]
impl LlmClient for ServiceLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.service.complete(request).await
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Adapter to use Database as `SummaryStore`
#[derive(Clone)]
pub struct DatabaseStorage {
    db: Database,
}

impl DatabaseStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SummaryStore for DatabaseStorage {
    async fn save_summary(&self, session_id: &str, summary: &CallSummary) -> Result<(), String> {
        self.db
            .record_summary(session_id, summary)
            .map_err(|e| e.to_string())
    }
}
