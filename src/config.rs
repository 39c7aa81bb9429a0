//! Process configuration from environment variables
//!
//! A `.env` file in the working directory is loaded first when present.

use crate::knowledge::{RetrieverKind, DEFAULT_TOP_K};
use crate::llm::{DEFAULT_MODEL, GROQ_CHAT_URL};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_KNOWLEDGE_PATH: &str = "knowledge_base/seed_data/knowledge_base.json";
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SESSION_RETENTION_SECS: u64 = 900;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub port: u16,
    pub db_path: PathBuf,
    pub knowledge_path: PathBuf,
    pub knowledge_backend: RetrieverKind,
    pub knowledge_top_k: usize,
    /// How long an ended call stays in memory before eviction
    pub session_retention: Duration,
    pub llm: LlmSettings,
}

/// Connection settings for the generation backend
#[derive(Debug, Clone, PartialEq)]
pub struct LlmSettings {
    /// `None` leaves every generation call to fail with an auth error
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = parse_or("COLD_CALLER_PORT", get("COLD_CALLER_PORT"), DEFAULT_PORT)?;

        let db_path = get("COLD_CALLER_DB_PATH").map_or_else(
            || {
                let home = get("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(format!("{home}/.cold-caller/calls.db"))
            },
            PathBuf::from,
        );

        let knowledge_path = PathBuf::from(
            get("KNOWLEDGE_PATH").unwrap_or_else(|| DEFAULT_KNOWLEDGE_PATH.to_string()),
        );

        let knowledge_backend = match get("KNOWLEDGE_BACKEND") {
            Some(raw) => RetrieverKind::from_str(&raw).map_err(|e| ConfigError::Invalid {
                var: "KNOWLEDGE_BACKEND",
                value: raw,
                reason: e.to_string(),
            })?,
            None => RetrieverKind::default(),
        };

        let knowledge_top_k: usize =
            parse_or("KNOWLEDGE_TOP_K", get("KNOWLEDGE_TOP_K"), DEFAULT_TOP_K)?;
        if knowledge_top_k == 0 {
            return Err(ConfigError::Invalid {
                var: "KNOWLEDGE_TOP_K",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let timeout_secs: u64 = parse_or(
            "LLM_TIMEOUT_SECS",
            get("LLM_TIMEOUT_SECS"),
            DEFAULT_LLM_TIMEOUT_SECS,
        )?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "LLM_TIMEOUT_SECS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let retention_secs: u64 = parse_or(
            "SESSION_RETENTION_SECS",
            get("SESSION_RETENTION_SECS"),
            DEFAULT_SESSION_RETENTION_SECS,
        )?;
        if retention_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "SESSION_RETENTION_SECS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let llm = LlmSettings {
            api_key: get("LLM_API_KEY").or_else(|| get("GROQ_API_KEY")),
            base_url: get("LLM_BASE_URL").unwrap_or_else(|| GROQ_CHAT_URL.to_string()),
            model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout: Duration::from_secs(timeout_secs),
        };

        Ok(Self {
            port,
            db_path,
            knowledge_path,
            knowledge_backend,
            knowledge_top_k,
            session_retention: Duration::from_secs(retention_secs),
            llm,
        })
    }
}

fn parse_or<T>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(value) = raw else {
        return Ok(default);
    };
    match value.trim().parse::<T>() {
        Ok(parsed) => Ok(parsed),
        Err(e) => Err(ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}
