//! Cold Caller - outbound sales call agent
//!
//! Drives each call through a fixed state machine, grounding every reply in a
//! curated knowledge base. Serves an HTTP API, or runs one call interactively
//! with `cold-caller console`.

mod api;
mod config;
mod console;
mod db;
mod knowledge;
mod llm;
mod runtime;
mod state_machine;
mod system_prompt;

use api::{create_router, AppState};
use config::AppConfig;
use db::Database;
use knowledge::{build_retriever, KnowledgeBase, KnowledgeFusion};
use llm::{LlmService, LoggingService, OpenAIService};
use runtime::{
    CallContext, CallOrchestrator, CallRuntime, DatabaseStorage, LlmClient, ServiceLlmClient,
    SharedRuntime, SummaryStore,
};
use state_machine::CallFlow;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "cold_caller=info,tower_http=debug";

enum Mode {
    Serve,
    Console,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mode = match std::env::args().nth(1).as_deref() {
        None | Some("serve") => Mode::Serve,
        Some("console") => Mode::Console,
        Some(other) => {
            return Err(format!("Unknown command {other:?} (expected 'serve' or 'console')").into())
        }
    };

    init_logging(&mode);

    let config = AppConfig::from_env()?;

    // The transition table and state configs must agree before any call runs
    let flow = Arc::new(CallFlow::standard()?);

    tracing::info!(path = %config.knowledge_path.display(), "Loading knowledge base");
    let base = Arc::new(KnowledgeBase::load(&config.knowledge_path)?);
    for entry in base.entries() {
        if let Some(next) = entry.follow_up_action.as_deref() {
            if base.get_by_id(next).is_none() {
                tracing::warn!(id = %entry.id, follow_up = %next, "Follow-up entry not found");
            }
        }
    }
    let retriever = build_retriever(config.knowledge_backend, base.clone());
    tracing::info!(
        entries = base.entries().len(),
        categories = ?base.list_categories(),
        metadata = %base.metadata(),
        backend = retriever.name(),
        top_k = config.knowledge_top_k,
        "Knowledge base ready"
    );
    let knowledge = KnowledgeFusion::new(base, retriever, config.knowledge_top_k);

    if config.llm.api_key.is_none() {
        tracing::warn!("No LLM API key configured. Set LLM_API_KEY or GROQ_API_KEY.");
    }
    let service: Arc<dyn LlmService> = Arc::new(OpenAIService::new(
        config.llm.api_key.clone().unwrap_or_default(),
        config.llm.base_url.clone(),
        config.llm.model.clone(),
        config.llm.timeout,
    )?);
    let llm: Arc<dyn LlmClient> = Arc::new(ServiceLlmClient::new(Arc::new(LoggingService::new(
        service,
    ))));

    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)?;
    let store: Arc<dyn SummaryStore> = Arc::new(DatabaseStorage::new(db.clone()));

    let orchestrator = CallOrchestrator::new(llm, knowledge, config.llm.timeout);
    let runtime: Arc<SharedRuntime> = Arc::new(CallRuntime::new(flow, orchestrator, store));

    match mode {
        Mode::Console => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let mut stdout = std::io::stdout();
            console::run(runtime.as_ref(), CallContext::default(), stdin, &mut stdout).await?;
        }
        Mode::Serve => {
            let retention = config.session_retention;
            let sweeper = runtime.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(retention);
                loop {
                    interval.tick().await;
                    sweeper.evict_finished(retention).await;
                }
            });

            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);

            let app = create_router(AppState::new(runtime, db))
                .layer(cors)
                .layer(TraceLayer::new_for_http());

            let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
            tracing::info!("Cold caller server listening on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}

fn init_logging(mode: &Mode) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    match mode {
        Mode::Serve => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_list(false),
            )
            .init(),
        // Keep stdout for the conversation itself
        Mode::Console => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}
