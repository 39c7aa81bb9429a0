//! Keyword retrieval backend
//!
//! Scores an entry by the fraction of its trigger phrases found in the query.

use super::{round_score, sort_by_score, KnowledgeBase, RetrievedEntry, Retriever};
use std::sync::Arc;

pub struct KeywordRetriever {
    base: Arc<KnowledgeBase>,
}

impl KeywordRetriever {
    pub fn new(base: Arc<KnowledgeBase>) -> Self {
        Self { base }
    }
}

#[allow(clippy::cast_precision_loss)] // phrase counts are tiny
fn phrase_score(phrases: &[String], query_lower: &str) -> f64 {
    if phrases.is_empty() {
        return 0.0;
    }
    let matched = phrases
        .iter()
        .filter(|p| !p.is_empty() && query_lower.contains(&p.to_lowercase()))
        .count();
    matched as f64 / phrases.len() as f64
}

impl Retriever for KeywordRetriever {
    fn retrieve(&self, query: &str, categories: &[String], top_k: usize) -> Vec<RetrievedEntry> {
        let query_lower = query.to_lowercase();

        let mut scored: Vec<RetrievedEntry> = self
            .base
            .by_categories(categories)
            .filter(|e| !e.is_compliance())
            .filter_map(|e| {
                let score = phrase_score(&e.trigger_phrases, &query_lower);
                (score > 0.0).then(|| e.to_retrieved(round_score(score)))
            })
            .collect();

        sort_by_score(&mut scored);
        scored.truncate(top_k);
        scored
    }

    fn name(&self) -> &'static str {
        "keyword"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::test_fixtures::sample_base;

    fn retriever() -> KeywordRetriever {
        KeywordRetriever::new(Arc::new(sample_base()))
    }

    fn cats(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| (*n).to_string()).collect()
    }

    #[test]
    fn test_scores_by_phrase_fraction() {
        let results = retriever().retrieve(
            "Honestly it's too expensive, the price is a problem",
            &cats(&["objection_handling"]),
            3,
        );
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "obj-001");
        // two of three phrases matched
        assert!((results[0].score - 0.667).abs() < 1e-9);
    }

    #[test]
    fn test_orders_by_descending_score() {
        let results = retriever().retrieve(
            "We already use a competitor and the price is high",
            &cats(&["objection_handling"]),
            3,
        );
        let ids: Vec<_> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["obj-002", "obj-001"]);
    }

    #[test]
    fn test_respects_categories_and_top_k() {
        let r = retriever();
        let results = r.retrieve("too expensive", &cats(&["product_knowledge"]), 3);
        assert!(results.is_empty());

        let results = r.retrieve(
            "too expensive, we already use a competitor",
            &cats(&["objection_handling"]),
            1,
        );
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_never_returns_compliance_or_phraseless_entries() {
        let results = retriever().retrieve(
            "remove me",
            &cats(&["compliance_rules", "qualifying_criteria"]),
            10,
        );
        assert!(results.is_empty());
    }
}
