//! Vector retrieval backend
//!
//! Embeds trigger phrases plus content into a fixed-size hashed bag-of-words
//! vector and ranks entries by cosine similarity to the query. The index is
//! built once at construction; compliance entries are not indexed.

use super::{round_score, sort_by_score, KnowledgeBase, KnowledgeEntry, RetrievedEntry, Retriever};

/// Embedding dimensionality
pub const EMBEDDING_DIM: usize = 384;

/// Words that carry no retrieval signal
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "is", "it", "its",
    "of", "on", "or", "so", "that", "the", "this", "to", "was", "we", "with", "you", "i", "me",
    "my", "our", "your",
];

struct IndexedEntry {
    entry: KnowledgeEntry,
    vector: Vec<f32>,
}

pub struct VectorRetriever {
    index: Vec<IndexedEntry>,
}

impl VectorRetriever {
    pub fn new(base: &KnowledgeBase) -> Self {
        let index: Vec<IndexedEntry> = base
            .entries()
            .iter()
            .filter(|e| !e.is_compliance())
            .filter_map(|e| {
                let text = format!("{} {}", e.trigger_phrases.join(" "), e.content);
                let vector = embed(text.trim())?;
                Some(IndexedEntry {
                    entry: e.clone(),
                    vector,
                })
            })
            .collect();

        tracing::debug!(indexed = index.len(), "Built knowledge vector index");
        Self { index }
    }
}

impl Retriever for VectorRetriever {
    fn retrieve(&self, query: &str, categories: &[String], top_k: usize) -> Vec<RetrievedEntry> {
        let Some(query_vector) = embed(query) else {
            return Vec::new();
        };

        let mut scored: Vec<RetrievedEntry> = self
            .index
            .iter()
            .filter(|ix| categories.iter().any(|c| *c == ix.entry.category))
            .filter_map(|ix| {
                let similarity = f64::from(cosine(&query_vector, &ix.vector));
                (similarity > 0.0).then(|| ix.entry.to_retrieved(round_score(similarity)))
            })
            .collect();

        sort_by_score(&mut scored);
        scored.truncate(top_k);
        scored
    }

    fn name(&self) -> &'static str {
        "vector"
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
}

/// FNV-1a, stable across platforms and releases
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(PRIME))
}

/// Unit-length embedding, `None` when the text has no usable tokens
#[allow(clippy::cast_possible_truncation)] // modulo EMBEDDING_DIM fits in usize
fn embed(text: &str) -> Option<Vec<f32>> {
    let mut vector = vec![0.0f32; EMBEDDING_DIM];
    let mut any = false;
    for token in tokenize(text) {
        let hash = fnv1a(token.as_bytes());
        let bucket = (hash % EMBEDDING_DIM as u64) as usize;
        // High bit picks the sign to spread collisions
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign;
        any = true;
    }
    if !any {
        return None;
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return None;
    }
    for v in &mut vector {
        *v /= norm;
    }
    Some(vector)
}

/// Cosine similarity of two unit vectors
fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
