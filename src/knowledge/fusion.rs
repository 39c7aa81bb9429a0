//! Per-turn knowledge selection
//!
//! Combines compliance rules, backend results and a category fallback into
//! one deduplicated list. Compliance always leads.

use super::{KnowledgeBase, RetrievedEntry, Retriever, FALLBACK_SCORE};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Clone)]
pub struct KnowledgeFusion {
    base: Arc<KnowledgeBase>,
    retriever: Arc<dyn Retriever>,
    top_k: usize,
}

impl KnowledgeFusion {
    pub fn new(base: Arc<KnowledgeBase>, retriever: Arc<dyn Retriever>, top_k: usize) -> Self {
        Self {
            base,
            retriever,
            top_k,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.retriever.name()
    }

    /// Select the knowledge for one turn.
    ///
    /// Order: matching compliance entries, then up to `top_k` backend results.
    /// When the backend finds nothing, every entry in `categories` is listed at
    /// the fallback score instead. Duplicate ids keep their first occurrence.
    pub fn fuse(&self, query: &str, categories: &[String]) -> Vec<RetrievedEntry> {
        let compliance = self.base.compliance_matches(query);
        let scored = self.retriever.retrieve(query, categories, self.top_k);

        let fallback: Vec<RetrievedEntry> = if scored.is_empty() {
            self.base
                .by_categories(categories)
                .map(|e| e.to_retrieved(FALLBACK_SCORE))
                .collect()
        } else {
            Vec::new()
        };

        tracing::debug!(
            backend = self.retriever.name(),
            compliance = compliance.len(),
            scored = scored.len(),
            fallback = fallback.len(),
            "Fused knowledge"
        );

        let mut seen = HashSet::new();
        compliance
            .into_iter()
            .chain(scored)
            .chain(fallback)
            .filter(|e| seen.insert(e.id.clone()))
            .collect()
    }
}
