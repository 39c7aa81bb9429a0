//! HTTP request handlers

use super::types::{
    AgentResponse, CallListQuery, CallListResponse, EndCallResponse, ErrorResponse,
    HealthResponse, StartCallRequest, TurnRequest,
};
use super::AppState;
use crate::db::{DbError, StoredSummary};
use crate::runtime::{CallSummary, RuntimeError};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Call lifecycle
        .route("/call/start", post(start_call))
        .route("/call/turn", post(process_turn))
        .route("/call/:id/summary", get(get_summary))
        .route("/call/:id", delete(end_call))
        // Finished calls
        .route("/calls", get(list_calls))
        .route("/calls/:id", get(get_stored_call))
        .route("/health", get(health))
        .with_state(state)
}

// ============================================================
// Call Lifecycle
// ============================================================

async fn start_call(
    State(state): State<AppState>,
    Json(req): Json<StartCallRequest>,
) -> Result<Json<AgentResponse>, AppError> {
    let context = req.context.unwrap_or_default();
    let (session_id, reply) = state.runtime.start(req.session_id, context).await?;
    Ok(Json(AgentResponse::new(session_id, reply)))
}

async fn process_turn(
    State(state): State<AppState>,
    Json(req): Json<TurnRequest>,
) -> Result<Json<AgentResponse>, AppError> {
    if req.prospect_message.trim().is_empty() {
        return Err(AppError::BadRequest(
            "prospect_message must not be empty".to_string(),
        ));
    }

    let reply = state
        .runtime
        .turn(&req.session_id, &req.prospect_message)
        .await?;
    Ok(Json(AgentResponse::new(req.session_id, reply)))
}

async fn get_summary(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CallSummary>, AppError> {
    Ok(Json(state.runtime.summary(&id).await?))
}

async fn end_call(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EndCallResponse>, AppError> {
    let summary = state.runtime.end(&id).await?;
    Ok(Json(EndCallResponse {
        session_id: id,
        summary,
    }))
}

// ============================================================
// Finished Calls and Health
// ============================================================

async fn list_calls(
    State(state): State<AppState>,
    Query(query): Query<CallListQuery>,
) -> Result<Json<CallListResponse>, AppError> {
    let calls = state.db.list_summaries(query.outcome)?;
    let outcomes = state.db.outcome_counts()?.into_iter().collect();
    Ok(Json(CallListResponse { calls, outcomes }))
}

async fn get_stored_call(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StoredSummary>, AppError> {
    Ok(Json(state.db.get_summary(&id)?))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        active_sessions: state.runtime.registry().len().await,
        knowledge_backend: state.runtime.knowledge_backend(),
        model: state.runtime.model_id().to_string(),
        diagnostics: state.runtime.diagnostics(),
    })
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<RuntimeError> for AppError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::SessionNotFound(_) => AppError::NotFound(err.to_string()),
            RuntimeError::SessionExists(_) | RuntimeError::AlreadyStarted(_) => {
                AppError::BadRequest(err.to_string())
            }
        }
    }
}

impl From<DbError> for AppError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::SummaryNotFound(_) => AppError::NotFound(err.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
