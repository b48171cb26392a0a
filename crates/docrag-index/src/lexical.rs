//! Sparse lexical search over an in-memory BM25 index.
//!
//! The index structure is rebuilt from the entire held corpus on every
//! `add` — O(corpus), deliberately preserved over incremental updates
//! because term statistics (document frequency, average length) are
//! corpus-wide. One mutex serializes both reads and writes: a rebuild
//! replaces the whole structure, so readers must never observe it
//! mid-swap.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use docrag_core::{Chunk, DocragError, Origin, Result, SearchResult};

const BM25_K1: f32 = 1.2;
const BM25_B: f32 = 0.75;

fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|t| t.to_lowercase())
        .collect()
}

/// BM25 index over one snapshot of the corpus. Immutable once built.
struct Bm25Index {
    /// term -> [(corpus position, term frequency)]
    postings: HashMap<String, Vec<(usize, u32)>>,
    doc_lengths: Vec<u32>,
    avg_doc_len: f32,
}

impl Bm25Index {
    fn build(corpus: &[Chunk]) -> Self {
        let mut postings: HashMap<String, Vec<(usize, u32)>> = HashMap::new();
        let mut doc_lengths = Vec::with_capacity(corpus.len());

        for (doc_idx, chunk) in corpus.iter().enumerate() {
            let tokens = tokenize(&chunk.text);
            doc_lengths.push(tokens.len() as u32);

            let mut term_freqs: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *term_freqs.entry(token).or_insert(0) += 1;
            }

            for (term, freq) in term_freqs {
                postings.entry(term).or_default().push((doc_idx, freq));
            }
        }

        let total_len: u32 = doc_lengths.iter().sum();
        let avg_doc_len = if doc_lengths.is_empty() {
            0.0
        } else {
            total_len as f32 / doc_lengths.len() as f32
        };

        Self {
            postings,
            doc_lengths,
            avg_doc_len,
        }
    }

    /// Score all matching documents, best first.
    fn score(&self, query: &str) -> Vec<(usize, f32)> {
        let n = self.doc_lengths.len() as f32;
        let mut scores: HashMap<usize, f32> = HashMap::new();

        for term in tokenize(query) {
            if let Some(postings) = self.postings.get(&term) {
                let df = postings.len() as f32;
                let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

                for &(doc_idx, tf) in postings {
                    let doc_len = self.doc_lengths[doc_idx] as f32;
                    let tf = tf as f32;

                    let score = idf * (tf * (BM25_K1 + 1.0))
                        / (tf + BM25_K1 * (1.0 - BM25_B + BM25_B * doc_len / self.avg_doc_len));

                    *scores.entry(doc_idx).or_insert(0.0) += score;
                }
            }
        }

        let mut results: Vec<_> = scores.into_iter().collect();
        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        results
    }
}

struct LexicalState {
    corpus: Vec<Chunk>,
    index: Option<Arc<Bm25Index>>,
}

/// Lexical search component: holds the full indexed corpus and its BM25
/// index, serialized under one lock.
pub struct LexicalSearch {
    state: Mutex<LexicalState>,
}

impl LexicalSearch {
    /// Empty component; `search` returns nothing until `add` is called.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LexicalState {
                corpus: Vec::new(),
                index: None,
            }),
        }
    }

    /// Warm-start from an existing corpus (e.g. dumped from the vector
    /// index at startup). Builds the index synchronously.
    pub fn with_corpus(corpus: Vec<Chunk>) -> Self {
        let index = if corpus.is_empty() {
            None
        } else {
            Some(Arc::new(Bm25Index::build(&corpus)))
        };

        info!("Lexical index initialized with {} documents", corpus.len());

        Self {
            state: Mutex::new(LexicalState { corpus, index }),
        }
    }

    /// BM25-ranked search over the indexed corpus, best first. Returns
    /// empty if nothing has ever been indexed.
    pub async fn search(&self, query: &str) -> Result<Vec<Chunk>> {
        Ok(self
            .search_results(query)
            .await?
            .into_iter()
            .map(|r| r.chunk)
            .collect())
    }

    /// Scored variant used by the fusion stage.
    pub async fn search_results(&self, query: &str) -> Result<Vec<SearchResult>> {
        let guard = self.state.lock().await;

        let Some(index) = guard.index.as_ref() else {
            warn!("Lexical index not initialized, returning no results");
            return Ok(Vec::new());
        };

        // Scoring is CPU-bound; run it off the event loop. The lock stays
        // held so a rebuild cannot swap the corpus under us.
        let index = Arc::clone(index);
        let query = query.to_string();
        let hits = tokio::task::spawn_blocking(move || index.score(&query))
            .await
            .map_err(|e| DocragError::lexical_index(format!("scoring task failed: {}", e)))?;

        Ok(hits
            .into_iter()
            .map(|(doc_idx, score)| SearchResult {
                chunk: guard.corpus[doc_idx].clone(),
                score,
                origin: Origin::Lexical,
            })
            .collect())
    }

    /// Append chunks to the corpus and rebuild the index from the entire
    /// updated corpus. O(corpus size), the most expensive write in the
    /// system; readers block for the duration.
    pub async fn add(&self, new_chunks: Vec<Chunk>) -> Result<()> {
        if new_chunks.is_empty() {
            debug!("Lexical add: no new documents");
            return Ok(());
        }

        let mut guard = self.state.lock().await;
        guard.corpus.extend(new_chunks);

        let corpus = guard.corpus.clone();
        let index = tokio::task::spawn_blocking(move || Bm25Index::build(&corpus))
            .await
            .map_err(|e| DocragError::lexical_index(format!("rebuild task failed: {}", e)))?;
        guard.index = Some(Arc::new(index));

        info!("Lexical index rebuilt, total documents: {}", guard.corpus.len());
        Ok(())
    }

    /// Number of indexed documents.
    pub async fn len(&self) -> usize {
        self.state.lock().await.corpus.len()
    }

    /// True if nothing has been indexed yet.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for LexicalSearch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrag_core::ChunkType;

    fn chunk(text: &str, idx: u32) -> Chunk {
        Chunk::new(
            text,
            ChunkType::Paragraph,
            false,
            None,
            "f.txt",
            "h",
            idx,
            None,
        )
    }

    #[tokio::test]
    async fn test_empty_search_returns_nothing() {
        let lexical = LexicalSearch::new();
        let results = lexical.search("запрос").await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_add_then_search_ranks_by_overlap() {
        let lexical = LexicalSearch::new();
        lexical
            .add(vec![
                chunk("поставка товара в срок", 0),
                chunk("оплата услуг по договору", 1),
                chunk("сроки поставки товара и порядок приёмки товара", 2),
            ])
            .await
            .unwrap();

        let results = lexical.search("поставка товара").await.unwrap();
        assert!(!results.is_empty());
        // Documents mentioning the query terms outrank the unrelated one.
        assert_ne!(results[0].chunk_index, 1);
        // The unrelated document does not match at all.
        assert!(results.iter().all(|c| c.chunk_index != 1));
    }

    #[tokio::test]
    async fn test_add_rebuilds_over_whole_corpus() {
        let lexical = LexicalSearch::new();
        lexical.add(vec![chunk("первый документ", 0)]).await.unwrap();
        lexical.add(vec![chunk("второй документ", 1)]).await.unwrap();

        assert_eq!(lexical.len().await, 2);

        // Both the old and the new chunk are searchable after the rebuild.
        let results = lexical.search("документ").await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_add_empty_is_noop() {
        let lexical = LexicalSearch::new();
        lexical.add(Vec::new()).await.unwrap();
        assert!(lexical.is_empty().await);
    }

    #[tokio::test]
    async fn test_with_corpus_warm_start() {
        let lexical = LexicalSearch::with_corpus(vec![chunk("готовый корпус", 0)]);
        let results = lexical.search("корпус").await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_tokenization_is_case_insensitive() {
        let lexical = LexicalSearch::with_corpus(vec![chunk("Поставка Товара", 0)]);
        let results = lexical.search("поставка").await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_and_searches() {
        let lexical = Arc::new(LexicalSearch::new());

        let mut handles = Vec::new();
        for i in 0..8u32 {
            let lex = Arc::clone(&lexical);
            handles.push(tokio::spawn(async move {
                lex.add(vec![chunk(&format!("документ номер {}", i), i)])
                    .await
                    .unwrap();
            }));
            let lex = Arc::clone(&lexical);
            handles.push(tokio::spawn(async move {
                // Interleaved reads must never observe a broken index.
                let _ = lex.search("документ").await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(lexical.len().await, 8);
        let results = lexical.search("документ").await.unwrap();
        assert_eq!(results.len(), 8);
    }
}
