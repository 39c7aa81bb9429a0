//! Knowledge base and retrieval
//!
//! Entries are loaded from a JSON seed file. Retrieval goes through the
//! [`Retriever`] trait so the scoring backend can be swapped by configuration
//! without touching the fusion policy in [`fusion`].

pub mod fusion;
mod keyword;
mod vector;

pub use fusion::KnowledgeFusion;
pub use keyword::KeywordRetriever;
pub use vector::VectorRetriever;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Category holding hard behavioural constraints
pub const COMPLIANCE_CATEGORY: &str = "compliance_rules";

/// Score assigned to compliance entries
pub const COMPLIANCE_SCORE: f64 = 1.0;

/// Score assigned to entries listed by category when scoring found nothing
pub const FALLBACK_SCORE: f64 = 0.5;

/// Default number of scored entries per retrieval
pub const DEFAULT_TOP_K: usize = 3;

#[derive(Error, Debug)]
pub enum KnowledgeError {
    #[error("Knowledge base not found: {0}")]
    NotFound(String),
    #[error("Failed to read knowledge base: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid knowledge base JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Unknown knowledge backend: {0} (expected 'keyword' or 'vector')")]
    UnknownBackend(String),
}

/// Entry as stored in the seed file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub subcategory: String,
    #[serde(default)]
    pub content: String,
    /// Phrases that make this entry relevant to a prospect message
    #[serde(default)]
    pub trigger_phrases: Vec<String>,
    #[serde(default)]
    pub follow_up_action: Option<String>,
    #[serde(default)]
    pub effectiveness_score: Option<f64>,
}

impl KnowledgeEntry {
    pub fn is_compliance(&self) -> bool {
        self.category == COMPLIANCE_CATEGORY
    }

    /// Case-insensitive phrase match. Entries without phrases always match.
    pub fn matches_phrase(&self, query_lower: &str) -> bool {
        self.trigger_phrases.is_empty()
            || self
                .trigger_phrases
                .iter()
                .any(|p| query_lower.contains(&p.to_lowercase()))
    }

    pub fn to_retrieved(&self, score: f64) -> RetrievedEntry {
        RetrievedEntry {
            id: self.id.clone(),
            category: self.category.clone(),
            subcategory: self.subcategory.clone(),
            content: self.content.clone(),
            follow_up_action: self.follow_up_action.clone(),
            score,
        }
    }
}

/// Entry selected to ground a generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedEntry {
    pub id: String,
    pub category: String,
    pub subcategory: String,
    pub content: String,
    pub follow_up_action: Option<String>,
    pub score: f64,
}

impl RetrievedEntry {
    pub fn is_compliance(&self) -> bool {
        self.category == COMPLIANCE_CATEGORY
    }
}

#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(default)]
    metadata: Value,
    #[serde(default)]
    knowledge_entries: Vec<KnowledgeEntry>,
}

/// In-memory knowledge base
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    metadata: Value,
    entries: Vec<KnowledgeEntry>,
}

impl KnowledgeBase {
    pub fn new(entries: Vec<KnowledgeEntry>) -> Self {
        Self {
            metadata: Value::Null,
            entries,
        }
    }

    /// Load the seed file at `path`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, KnowledgeError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(KnowledgeError::NotFound(path.display().to_string()));
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, KnowledgeError> {
        let seed: SeedFile = serde_json::from_str(raw)?;
        Ok(Self {
            metadata: seed.metadata,
            entries: seed.knowledge_entries,
        })
    }

    pub fn metadata(&self) -> &Value {
        &self.metadata
    }

    pub fn entries(&self) -> &[KnowledgeEntry] {
        &self.entries
    }

    /// Direct lookup, used to follow `follow_up_action` references
    pub fn get_by_id(&self, id: &str) -> Option<&KnowledgeEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Distinct categories, sorted
    pub fn list_categories(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.category.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Compliance entries that apply to `query`, in file order
    pub fn compliance_matches(&self, query: &str) -> Vec<RetrievedEntry> {
        let query_lower = query.to_lowercase();
        self.entries
            .iter()
            .filter(|e| e.is_compliance() && e.matches_phrase(&query_lower))
            .map(|e| e.to_retrieved(COMPLIANCE_SCORE))
            .collect()
    }

    /// Every entry in one of `categories`, in file order
    pub fn by_categories<'a>(
        &'a self,
        categories: &'a [String],
    ) -> impl Iterator<Item = &'a KnowledgeEntry> + 'a {
        self.entries
            .iter()
            .filter(move |e| categories.iter().any(|c| *c == e.category))
    }
}

/// Scored retrieval over the knowledge base.
///
/// Implementations never return compliance entries and return at most `top_k`
/// results ordered by descending score.
pub trait Retriever: Send + Sync {
    fn retrieve(&self, query: &str, categories: &[String], top_k: usize) -> Vec<RetrievedEntry>;

    /// Backend name for logs
    fn name(&self) -> &'static str;
}

/// Retrieval backend selected by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetrieverKind {
    /// Trigger phrase matching
    #[default]
    Keyword,
    /// Hashed bag-of-words embeddings with cosine similarity
    Vector,
}

impl FromStr for RetrieverKind {
    type Err = KnowledgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keyword" | "lexical" => Ok(RetrieverKind::Keyword),
            "vector" | "embedding" => Ok(RetrieverKind::Vector),
            other => Err(KnowledgeError::UnknownBackend(other.to_string())),
        }
    }
}

/// Build the configured backend over `base`
pub fn build_retriever(kind: RetrieverKind, base: Arc<KnowledgeBase>) -> Arc<dyn Retriever> {
    match kind {
        RetrieverKind::Keyword => Arc::new(KeywordRetriever::new(base)),
        RetrieverKind::Vector => Arc::new(VectorRetriever::new(&base)),
    }
}

/// Round a similarity to three decimals for stable output
pub(crate) fn round_score(score: f64) -> f64 {
    (score * 1000.0).round() / 1000.0
}

/// Stable sort by descending score, ties keep their original order
pub(crate) fn sort_by_score(entries: &mut [RetrievedEntry]) {
    entries.sort_by(|a, b| b.score.total_cmp(&a.score));
}
