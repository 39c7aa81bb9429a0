//! Database module for finished calls
//!
//! Stores the summary of every call that reached its terminal state. Live
//! sessions are never written here.

mod schema;

pub use schema::*;

use crate::runtime::CallSummary;
use crate::state_machine::Outcome;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Summary not found: {0}")]
    SummaryNotFound(String),
    #[error("Failed to encode summary: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("Failed to create database directory: {0}")]
    Io(#[from] std::io::Error),
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database
    #[cfg(test)]
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run_migrations(&self) -> DbResult<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== Summary Operations ====================

    /// Store the summary of a finished call. A repeated id replaces the row.
    pub fn record_summary(&self, session_id: &str, summary: &CallSummary) -> DbResult<()> {
        let json = serde_json::to_string(summary)?;
        let total_turns = i64::try_from(summary.total_turns).unwrap_or(i64::MAX);

        self.conn().execute(
            "INSERT OR REPLACE INTO call_summaries
                (session_id, prospect_name, prospect_company, outcome, total_turns, summary, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                session_id,
                summary.prospect.name,
                summary.prospect.company,
                summary.outcome.as_str(),
                total_turns,
                json,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Get the stored summary of one call
    pub fn get_summary(&self, session_id: &str) -> DbResult<StoredSummary> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT session_id, summary, completed_at FROM call_summaries WHERE session_id = ?1",
        )?;

        let row = stmt
            .query_row(params![session_id], read_row)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    DbError::SummaryNotFound(session_id.to_string())
                }
                other => DbError::Sqlite(other),
            })?;
        decode(row)
    }

    /// List stored calls, newest first, optionally filtered by outcome
    pub fn list_summaries(&self, outcome: Option<Outcome>) -> DbResult<Vec<StoredSummary>> {
        let conn = self.conn();
        let rows: Vec<RawRow> = if let Some(outcome) = outcome {
            let mut stmt = conn.prepare(
                "SELECT session_id, summary, completed_at FROM call_summaries
                 WHERE outcome = ?1 ORDER BY completed_at DESC",
            )?;
            let rows = stmt.query_map(params![outcome.as_str()], read_row)?;
            rows.collect::<Result<_, _>>()?
        } else {
            let mut stmt = conn.prepare(
                "SELECT session_id, summary, completed_at FROM call_summaries
                 ORDER BY completed_at DESC",
            )?;
            let rows = stmt.query_map([], read_row)?;
            rows.collect::<Result<_, _>>()?
        };

        rows.into_iter().map(decode).collect()
    }

    /// Number of stored calls per outcome
    pub fn outcome_counts(&self) -> DbResult<Vec<(String, i64)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT outcome, COUNT(*) FROM call_summaries GROUP BY outcome ORDER BY outcome",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<Result<_, _>>()?)
    }
}

type RawRow = (String, String, String);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn decode((session_id, json, completed_at): RawRow) -> DbResult<StoredSummary> {
    let summary: CallSummary = serde_json::from_str(&json)?;
    Ok(StoredSummary {
        session_id,
        outcome: summary.outcome,
        completed_at: parse_datetime(&completed_at),
        summary,
    })
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
