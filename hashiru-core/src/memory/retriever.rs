//! Cosine-similarity retrieval over a [`MemoryStore`], used to inject relevant memories into
//! history before each turn. `MemoryRecord`s carry no stored embedding, so both the query and
//! every candidate's text are embedded at retrieval time.

use std::sync::Arc;

use tracing::warn;

use super::embedder::Embedder;
use super::store::{MemoryRecord, MemoryStore};

/// Retrieves the top-k memories most similar to a query, tolerating embedder failures by
/// returning no memories rather than failing the turn.
pub struct MemoryRetriever {
    store: Arc<MemoryStore>,
    embedder: Arc<dyn Embedder>,
}

impl MemoryRetriever {
    pub fn new(store: Arc<MemoryStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    /// Returns up to `k` records whose cosine similarity to `query` is at least `threshold`,
    /// sorted most-similar first. Returns an empty list if the store is empty or the
    /// embedder fails (logged, not propagated).
    pub async fn top_k(&self, query: &str, k: usize, threshold: f32) -> Vec<MemoryRecord> {
        let records = self.store.list();
        if records.is_empty() {
            return Vec::new();
        }

        let mut texts: Vec<&str> = vec![query];
        texts.extend(records.iter().map(|r| r.memory.as_str()));

        let vectors = match self.embedder.embed(&texts).await {
            Ok(vectors) if vectors.len() == texts.len() => vectors,
            Ok(_) => {
                warn!("embedder returned a mismatched vector count for memory retrieval");
                return Vec::new();
            }
            Err(e) => {
                warn!(error = %e, "embedder failed during memory retrieval; skipping injection");
                return Vec::new();
            }
        };

        let query_vec = &vectors[0];
        let mut scored: Vec<(f32, MemoryRecord)> = records
            .into_iter()
            .zip(vectors[1..].iter())
            .map(|(record, vec)| (cosine_similarity(query_vec, vec), record))
            .filter(|(score, _)| *score >= threshold)
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored.into_iter().map(|(_, record)| record).collect()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HashiruError;
    use async_trait::async_trait;

    /// Embeds each text as a one-hot vector keyed by a substring match, so tests can express
    /// "this text is about pets" without a real embedding model.
    struct KeywordEmbedder {
        keywords: Vec<&'static str>,
    }

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, HashiruError> {
            Ok(texts
                .iter()
                .map(|t| {
                    let lower = t.to_lowercase();
                    self.keywords
                        .iter()
                        .map(|kw| if lower.contains(kw) { 1.0 } else { 0.0 })
                        .collect()
                })
                .collect())
        }

        fn dimension(&self) -> usize {
            self.keywords.len()
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, HashiruError> {
            Err(HashiruError::BackendError { message: "down".into(), retryable: true })
        }

        fn dimension(&self) -> usize {
            1
        }
    }

    #[test]
    fn cosine_similarity_of_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_of_orthogonal_vectors_is_zero() {
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-6);
    }

    #[tokio::test]
    async fn top_k_ranks_pet_memory_ahead_of_city_memory() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::open(dir.path().join("memory.json")).unwrap());
        store.add("pet", "user's pet is a dog named Rex").unwrap();
        store.add("city", "user lives in Davis").unwrap();

        let embedder = Arc::new(KeywordEmbedder { keywords: vec!["pet", "dog", "city"] });
        let retriever = MemoryRetriever::new(store, embedder);
        let results = retriever.top_k("what is my pet's name?", 5, 0.1).await;

        assert!(!results.is_empty());
        assert_eq!(results[0].key, "pet");
    }

    #[tokio::test]
    async fn top_k_returns_empty_when_store_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::open(dir.path().join("memory.json")).unwrap());
        let retriever = MemoryRetriever::new(store, Arc::new(KeywordEmbedder { keywords: vec!["x"] }));
        assert!(retriever.top_k("query", 5, 0.0).await.is_empty());
    }

    #[tokio::test]
    async fn top_k_tolerates_embedder_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::open(dir.path().join("memory.json")).unwrap());
        store.add("k", "some memory").unwrap();
        let retriever = MemoryRetriever::new(store, Arc::new(FailingEmbedder));
        assert!(retriever.top_k("query", 5, 0.0).await.is_empty());
    }
}
