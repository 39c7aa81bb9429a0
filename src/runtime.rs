//! Runtime for live calls
//!
//! Holds the session registry and routes start/turn/summary requests to the
//! orchestrator. Each session sits behind its own async mutex, so turns on one
//! call are serialized while distinct calls proceed in parallel.

mod executor;
mod recovery;
pub mod reply;
pub mod session;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::{CallOrchestrator, Diagnostics, DiagnosticsSnapshot, TurnReply, TurnTrace, CALL_ENDED};
pub use session::{CallContext, CallSession, CallSummary};
pub use traits::*;

use crate::state_machine::CallFlow;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

/// Runtime over boxed I/O, as served by the HTTP layer
pub type SharedRuntime = CallRuntime<Arc<dyn LlmClient>, Arc<dyn SummaryStore>>;

/// Shared handle to one live session
pub type SessionHandle = Arc<Mutex<CallSession>>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),
    #[error("Session already exists: {0}")]
    SessionExists(String),
    #[error("Call already started: {0}")]
    AlreadyStarted(String),
}

/// Live sessions by id
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session. Ids are unique among live sessions.
    pub async fn create(&self, session: CallSession) -> Result<SessionHandle, RuntimeError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(session.id()) {
            return Err(RuntimeError::SessionExists(session.id().to_string()));
        }
        let id = session.id().to_string();
        let handle = Arc::new(Mutex::new(session));
        sessions.insert(id, handle.clone());
        Ok(handle)
    }

    pub async fn get(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.write().await.remove(id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop sessions that ended at least `retention` ago.
    ///
    /// Sessions locked by an in-flight request are kept for the next sweep.
    pub async fn evict_finished(&self, retention: Duration) -> Vec<String> {
        let mut evicted = Vec::new();
        self.sessions.write().await.retain(|id, handle| {
            let expired = handle
                .try_lock()
                .is_ok_and(|session| session.ended_before(retention));
            if expired {
                evicted.push(id.clone());
            }
            !expired
        });
        evicted
    }
}

/// Manager for all live calls
pub struct CallRuntime<L: LlmClient, S: SummaryStore> {
    flow: Arc<CallFlow>,
    orchestrator: CallOrchestrator<L>,
    registry: SessionRegistry,
    store: S,
}

impl<L: LlmClient, S: SummaryStore> CallRuntime<L, S> {
    pub fn new(flow: Arc<CallFlow>, orchestrator: CallOrchestrator<L>, store: S) -> Self {
        Self {
            flow,
            orchestrator,
            registry: SessionRegistry::new(),
            store,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.orchestrator.diagnostics().snapshot()
    }

    pub fn knowledge_backend(&self) -> &'static str {
        self.orchestrator.knowledge().backend_name()
    }

    pub fn model_id(&self) -> &str {
        self.orchestrator.model_id()
    }

    /// Create a session and generate its opening line.
    ///
    /// A fresh id is generated when none is given.
    pub async fn start(
        &self,
        session_id: Option<String>,
        context: CallContext,
    ) -> Result<(String, TurnReply), RuntimeError> {
        let id = session_id
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let handle = self
            .registry
            .create(CallSession::new(id.clone(), context, self.flow.clone()))
            .await?;

        let mut session = handle.lock().await;
        let reply = self.orchestrator.start_call(&mut session).await?;
        Ok((id, reply))
    }

    /// Run one prospect turn. Persists the summary when the call just ended.
    pub async fn turn(&self, session_id: &str, message: &str) -> Result<TurnReply, RuntimeError> {
        let handle = self
            .registry
            .get(session_id)
            .await
            .ok_or_else(|| RuntimeError::SessionNotFound(session_id.to_string()))?;

        let mut session = handle.lock().await;
        let was_terminal = session.is_terminal();
        let reply = self.orchestrator.process_turn(&mut session, message).await;

        if reply.is_terminal && !was_terminal {
            session.mark_ended();
            let summary = session.summary();
            tracing::info!(
                session_id = %session_id,
                outcome = %summary.outcome,
                total_turns = summary.total_turns,
                duration_s = (chrono::Utc::now() - session.created_at()).num_seconds(),
                "Call ended"
            );
            if let Err(e) = self.store.save_summary(session_id, &summary).await {
                tracing::error!(session_id = %session_id, error = %e, "Failed to store call summary");
            }
        }

        Ok(reply)
    }

    pub async fn summary(&self, session_id: &str) -> Result<CallSummary, RuntimeError> {
        let handle = self
            .registry
            .get(session_id)
            .await
            .ok_or_else(|| RuntimeError::SessionNotFound(session_id.to_string()))?;
        let session = handle.lock().await;
        Ok(session.summary())
    }

    /// Evict ended sessions past the retention window. Their summaries
    /// were stored when they ended.
    pub async fn evict_finished(&self, retention: Duration) -> usize {
        let evicted = self.registry.evict_finished(retention).await;
        if !evicted.is_empty() {
            tracing::info!(count = evicted.len(), sessions = ?evicted, "Evicted finished sessions");
        }
        evicted.len()
    }

    /// Drop a live session, returning its final summary
    pub async fn end(&self, session_id: &str) -> Result<CallSummary, RuntimeError> {
        let handle = self
            .registry
            .remove(session_id)
            .await
            .ok_or_else(|| RuntimeError::SessionNotFound(session_id.to_string()))?;
        let session = handle.lock().await;
        tracing::info!(session_id = %session_id, state = %session.current_state(), "Session removed");
        Ok(session.summary())
    }
}
