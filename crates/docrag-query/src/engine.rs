//! Hybrid retrieval orchestrator: vector + lexical -> fuse -> rerank.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use docrag_core::{RankedChunk, Result, RetrievalConfig, SearchResult};
use docrag_index::{LexicalSearch, VectorSearch};

use crate::fusion::fuse;
use crate::rerank::Reranker;

/// Per-request retrieval tunables. Unset fields fall back to the
/// retriever's configured defaults.
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub k: Option<usize>,
    pub fetch_k: Option<usize>,
    pub pre_rerank_k: Option<usize>,
    pub top_k: Option<usize>,
}

/// Runs both search engines, fuses their candidate lists, reranks, and
/// truncates to the requested result count.
pub struct HybridRetriever {
    vector: VectorSearch,
    lexical: Option<Arc<LexicalSearch>>,
    reranker: Arc<dyn Reranker>,
    pre_rerank_k: usize,
    top_k: usize,
}

impl HybridRetriever {
    pub fn new(
        vector: VectorSearch,
        lexical: Option<Arc<LexicalSearch>>,
        reranker: Arc<dyn Reranker>,
        config: &RetrievalConfig,
    ) -> Self {
        info!(
            "HybridRetriever initialized (pre_rerank_k={}, top_k={})",
            config.pre_rerank_k, config.top_k
        );

        Self {
            vector,
            lexical,
            reranker,
            pre_rerank_k: config.pre_rerank_k,
            top_k: config.top_k,
        }
    }

    /// Retrieve the final evidence set for a query with the configured
    /// defaults. A fatal error in any stage aborts the whole retrieval;
    /// an unconfigured lexical side is simply omitted from fusion.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RankedChunk>> {
        self.retrieve_with(query, &SearchParams::default()).await
    }

    /// Retrieve with per-request tunables.
    pub async fn retrieve_with(
        &self,
        query: &str,
        params: &SearchParams,
    ) -> Result<Vec<RankedChunk>> {
        let start = Instant::now();
        let pre_rerank_k = params.pre_rerank_k.unwrap_or(self.pre_rerank_k);
        let top_k = params.top_k.unwrap_or(self.top_k);
        info!("Hybrid retrieval started");

        // The two searches are independent; run them concurrently.
        let (vector_results, lexical_results) = tokio::join!(
            self.vector_search(query, params),
            self.lexical_search(query)
        );
        let vector_results = vector_results?;
        let lexical_results = lexical_results?;

        debug!(
            "Vector returned {} results, lexical returned {}",
            vector_results.len(),
            lexical_results.len()
        );

        let candidates = fuse(vector_results, lexical_results, pre_rerank_k);
        debug!("Candidates before rerank: {}", candidates.len());

        let ranked = self.reranker.rerank(query, candidates).await?;

        let results: Vec<RankedChunk> = ranked.into_iter().take(top_k).collect();
        info!(
            "Hybrid retrieval finished in {}ms, returned {} results",
            start.elapsed().as_millis(),
            results.len()
        );

        Ok(results)
    }

    async fn vector_search(&self, query: &str, params: &SearchParams) -> Result<Vec<SearchResult>> {
        let k = params.k.unwrap_or(self.vector.k());
        let fetch_k = params.fetch_k.unwrap_or(self.vector.fetch_k());
        self.vector.search_results(query, k, fetch_k).await
    }

    async fn lexical_search(&self, query: &str) -> Result<Vec<SearchResult>> {
        match &self.lexical {
            Some(lexical) => lexical.search_results(query).await,
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrag_core::{Chunk, ChunkType, Embedder, VectorIndex};
    use docrag_index::{HashEmbedder, MemoryVectorIndex};

    use crate::rerank::MockReranker;

    async fn indexed_corpus(texts: &[&str]) -> (Arc<MemoryVectorIndex>, Arc<LexicalSearch>) {
        let embedder = HashEmbedder::with_dimension(32);
        let vector = Arc::new(MemoryVectorIndex::new());
        let lexical = Arc::new(LexicalSearch::new());

        let chunks: Vec<Chunk> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                Chunk::new(
                    t,
                    ChunkType::Paragraph,
                    false,
                    None,
                    "f.txt",
                    "h",
                    i as u32,
                    None,
                )
            })
            .collect();

        let refs: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = embedder.embed_documents(&refs).await.unwrap();
        vector.upsert(&chunks, &embeddings).await.unwrap();
        lexical.add(chunks).await.unwrap();

        (vector, lexical)
    }

    fn retriever(
        vector: Arc<MemoryVectorIndex>,
        lexical: Option<Arc<LexicalSearch>>,
        config: &RetrievalConfig,
    ) -> HybridRetriever {
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::with_dimension(32));
        let search = VectorSearch::with_config(embedder, vector, config);
        HybridRetriever::new(search, lexical, Arc::new(MockReranker::new()), config)
    }

    #[tokio::test]
    async fn test_top_k_truncation() {
        let texts = [
            "поставка товара первая",
            "поставка товара вторая",
            "поставка товара третья",
            "поставка товара четвёртая",
            "поставка товара пятая",
        ];
        let (vector, lexical) = indexed_corpus(&texts).await;

        let config = RetrievalConfig {
            top_k: 2,
            ..Default::default()
        };
        let retriever = retriever(vector, Some(lexical), &config);

        let results = retriever.retrieve("поставка товара").await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_result_count_bounded_by_candidates() {
        let (vector, lexical) = indexed_corpus(&["единственный документ"]).await;
        let retriever = retriever(vector, Some(lexical), &RetrievalConfig::default());

        let results = retriever.retrieve("документ").await.unwrap();
        // min(top_k, ranked candidates)
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_lexical_is_not_an_error() {
        let (vector, _) = indexed_corpus(&["только векторный поиск"]).await;
        let retriever = retriever(vector, None, &RetrievalConfig::default());

        let results = retriever.retrieve("векторный").await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_corpus_yields_empty_results() {
        let vector = Arc::new(MemoryVectorIndex::new());
        let retriever = retriever(vector, None, &RetrievalConfig::default());

        let results = retriever.retrieve("что угодно").await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_reranked_scores_non_increasing() {
        let texts = [
            "про аренду помещения",
            "поставка товара по договору поставки",
            "поставка товара",
        ];
        let (vector, lexical) = indexed_corpus(&texts).await;
        let retriever = retriever(vector, Some(lexical), &RetrievalConfig::default());

        let results = retriever.retrieve("поставка товара").await.unwrap();
        let scores: Vec<f32> = results.iter().filter_map(|r| r.score).collect();
        assert!(!scores.is_empty());
        for pair in scores.windows(2) {
            assert!(pair[0] >= pair[1]);
        }
    }
}
