//! Dense vector search with maximal-marginal-relevance selection.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use docrag_core::{
    Chunk, DocragError, Embedder, Origin, Result, RetrievalConfig, ScoredVector, SearchResult,
    VectorIndex,
};

/// Cosine similarity between two equal-length vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// In-memory vector index keyed by chunk id.
///
/// The production deployment points the `VectorIndex` capability at an
/// external engine; this implementation backs tests and the CLI.
pub struct MemoryVectorIndex {
    entries: RwLock<HashMap<Uuid, (Chunk, Vec<f32>)>>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn read_entries(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<Uuid, (Chunk, Vec<f32>)>>> {
        self.entries
            .read()
            .map_err(|e| DocragError::vector_index(format!("index lock poisoned: {}", e)))
    }
}

impl Default for MemoryVectorIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn upsert(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()> {
        if chunks.len() != embeddings.len() {
            return Err(DocragError::vector_index(format!(
                "chunk/embedding count mismatch: {} vs {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let mut entries = self
            .entries
            .write()
            .map_err(|e| DocragError::vector_index(format!("index lock poisoned: {}", e)))?;

        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            entries.insert(chunk.id, (chunk.clone(), embedding.clone()));
        }

        debug!("Upserted {} chunks, index size {}", chunks.len(), entries.len());
        Ok(())
    }

    async fn nearest(&self, embedding: &[f32], fetch_k: usize) -> Result<Vec<ScoredVector>> {
        let entries = self.read_entries()?;

        let mut scored: Vec<ScoredVector> = entries
            .values()
            .map(|(chunk, stored)| ScoredVector {
                chunk: chunk.clone(),
                embedding: stored.clone(),
                similarity: cosine_similarity(embedding, stored),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(fetch_k);

        Ok(scored)
    }

    async fn all_chunks(&self) -> Result<Vec<Chunk>> {
        let entries = self.read_entries()?;

        let mut chunks: Vec<Chunk> = entries.values().map(|(c, _)| c.clone()).collect();
        chunks.sort_by(|a, b| {
            a.source
                .cmp(&b.source)
                .then(a.chunk_index.cmp(&b.chunk_index))
        });
        Ok(chunks)
    }
}

/// Dense retrieval: embed the query, fetch `fetch_k` nearest neighbors,
/// then pick `k` of them with maximal marginal relevance so the result
/// set is not dominated by near-duplicates.
pub struct VectorSearch {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    k: usize,
    fetch_k: usize,
    mmr_lambda: f32,
}

impl VectorSearch {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self::with_config(embedder, index, &RetrievalConfig::default())
    }

    pub fn with_config(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            k: config.k,
            fetch_k: config.fetch_k.max(config.k),
            mmr_lambda: config.mmr_lambda,
        }
    }

    /// Search with the configured `k`/`fetch_k`.
    pub async fn search(&self, query: &str) -> Result<Vec<Chunk>> {
        self.search_with(query, self.k, self.fetch_k).await
    }

    /// Configured result count.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Configured candidate pool size.
    pub fn fetch_k(&self) -> usize {
        self.fetch_k
    }

    /// Search with explicit `k` and `fetch_k` (clamped to `fetch_k >= k`).
    pub async fn search_with(&self, query: &str, k: usize, fetch_k: usize) -> Result<Vec<Chunk>> {
        Ok(self
            .search_results(query, k, fetch_k)
            .await?
            .into_iter()
            .map(|r| r.chunk)
            .collect())
    }

    /// Scored variant used by the fusion stage.
    pub async fn search_results(
        &self,
        query: &str,
        k: usize,
        fetch_k: usize,
    ) -> Result<Vec<SearchResult>> {
        let fetch_k = fetch_k.max(k);
        debug!("Vector search (k={}, fetch_k={})", k, fetch_k);

        let query_embedding = self.embedder.embed_query(query).await?;
        let candidates = self.index.nearest(&query_embedding, fetch_k).await?;

        Ok(mmr_select(&query_embedding, candidates, k, self.mmr_lambda)
            .into_iter()
            .map(|s| SearchResult {
                chunk: s.chunk,
                score: s.similarity,
                origin: Origin::Vector,
            })
            .collect())
    }
}

/// Greedy MMR: each round picks the candidate maximizing
/// `lambda * sim(query, c) - (1 - lambda) * max_selected sim(c, s)`.
fn mmr_select(
    query: &[f32],
    candidates: Vec<ScoredVector>,
    k: usize,
    lambda: f32,
) -> Vec<ScoredVector> {
    let mut remaining = candidates;
    let mut selected: Vec<ScoredVector> = Vec::with_capacity(k.min(remaining.len()));

    while selected.len() < k && !remaining.is_empty() {
        let mut best_idx = 0;
        let mut best_score = f32::NEG_INFINITY;

        for (i, candidate) in remaining.iter().enumerate() {
            let relevance = cosine_similarity(query, &candidate.embedding);
            let redundancy = selected
                .iter()
                .map(|s| cosine_similarity(&candidate.embedding, &s.embedding))
                .fold(0.0f32, f32::max);
            let score = lambda * relevance - (1.0 - lambda) * redundancy;

            if score > best_score {
                best_score = score;
                best_idx = i;
            }
        }

        selected.push(remaining.swap_remove(best_idx));
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashEmbedder;
    use docrag_core::ChunkType;

    fn chunk(text: &str) -> Chunk {
        Chunk::new(text, ChunkType::Paragraph, false, None, "f.txt", "h", 0, None)
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_upsert_overwrites_same_id() {
        let index = MemoryVectorIndex::new();
        let c = chunk("повторяющийся текст");

        index.upsert(&[c.clone()], &[vec![1.0, 0.0]]).await.unwrap();
        index.upsert(&[c.clone()], &[vec![1.0, 0.0]]).await.unwrap();

        let all = index.all_chunks().await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_nearest_orders_by_similarity() {
        let index = MemoryVectorIndex::new();
        let a = chunk("близкий");
        let b = chunk("дальний");
        index
            .upsert(&[a.clone(), b.clone()], &[vec![1.0, 0.0], vec![0.0, 1.0]])
            .await
            .unwrap();

        let hits = index.nearest(&[1.0, 0.1], 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.id, a.id);
        assert!(hits[0].similarity > hits[1].similarity);
    }

    #[tokio::test]
    async fn test_nearest_truncates_to_fetch_k() {
        let index = MemoryVectorIndex::new();
        for i in 0..10 {
            let c = chunk(&format!("текст номер {}", i));
            index.upsert(&[c], &[vec![i as f32, 1.0]]).await.unwrap();
        }
        let hits = index.nearest(&[1.0, 0.0], 3).await.unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn test_mmr_prefers_diversity_over_duplicates() {
        // Two near-identical candidates and one distinct; with k=2 MMR
        // must pick the distinct one over the duplicate.
        let query = vec![1.0, 0.0];
        let dup1 = ScoredVector {
            chunk: chunk("дубликат один"),
            embedding: vec![1.0, 0.0],
            similarity: 1.0,
        };
        let dup2 = ScoredVector {
            chunk: chunk("дубликат два"),
            embedding: vec![0.999, 0.01],
            similarity: 0.999,
        };
        let distinct = ScoredVector {
            chunk: chunk("другая тема"),
            embedding: vec![0.5, 0.8],
            similarity: 0.5,
        };

        let picked = mmr_select(&query, vec![dup1.clone(), dup2, distinct.clone()], 2, 0.5);
        assert_eq!(picked.len(), 2);
        assert_eq!(picked[0].chunk.id, dup1.chunk.id);
        assert_eq!(picked[1].chunk.id, distinct.chunk.id);
    }

    #[test]
    fn test_mmr_returns_at_most_k() {
        let query = vec![1.0, 0.0];
        let candidates: Vec<ScoredVector> = (0..5)
            .map(|i| ScoredVector {
                chunk: chunk(&format!("кандидат {}", i)),
                embedding: vec![1.0 / (i + 1) as f32, 0.1 * i as f32],
                similarity: 0.0,
            })
            .collect();

        assert_eq!(mmr_select(&query, candidates.clone(), 3, 0.5).len(), 3);
        assert_eq!(mmr_select(&query, candidates, 10, 0.5).len(), 5);
    }

    #[tokio::test]
    async fn test_search_end_to_end() {
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::with_dimension(64));
        let index = Arc::new(MemoryVectorIndex::new());

        let chunks: Vec<Chunk> = (0..8)
            .map(|i| {
                Chunk::new(
                    &format!("пункт договора номер {}", i),
                    ChunkType::Paragraph,
                    false,
                    None,
                    "contract.txt",
                    "h",
                    i,
                    None,
                )
            })
            .collect();
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = embedder.embed_documents(&texts).await.unwrap();
        index.upsert(&chunks, &embeddings).await.unwrap();

        let search = VectorSearch::new(embedder, index);
        let results = search.search_with("пункт договора номер 3", 5, 50).await.unwrap();

        assert_eq!(results.len(), 5);
        // The exact-match chunk is most similar and must come first.
        assert_eq!(results[0].text, "пункт договора номер 3");
    }

    #[tokio::test]
    async fn test_fetch_k_clamped_to_k() {
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::with_dimension(32));
        let index = Arc::new(MemoryVectorIndex::new());

        let chunks: Vec<Chunk> = (0..6)
            .map(|i| chunk(&format!("элемент {}", i)))
            .collect();
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = embedder.embed_documents(&texts).await.unwrap();
        index.upsert(&chunks, &embeddings).await.unwrap();

        let search = VectorSearch::new(embedder, index);
        // fetch_k below k gets raised to k.
        let results = search.search_with("элемент", 4, 1).await.unwrap();
        assert_eq!(results.len(), 4);
    }
}
