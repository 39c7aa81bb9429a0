//! HTTP API for live calls

mod handlers;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::db::Database;
use crate::runtime::SharedRuntime;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<SharedRuntime>,
    pub db: Database,
}

impl AppState {
    pub fn new(runtime: Arc<SharedRuntime>, db: Database) -> Self {
        Self { runtime, db }
    }
}
