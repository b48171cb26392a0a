//! Fusion of vector and lexical candidate lists by content identity.

use std::collections::HashMap;

use docrag_core::{Chunk, SearchResult};

/// Merge the two scored candidate lists, deduplicating by content hash
/// (falling back to raw text when the hash is absent). Pre-fusion scores
/// and origins are discarded here; the reranker assigns the scores that
/// matter.
///
/// The vector list is inserted first, then the lexical list; a later
/// insertion for the same key overwrites the stored record, so a chunk
/// found by both engines keeps the lexical copy's metadata — but its
/// position in the output is the first-insertion position, i.e. its
/// vector-list slot. The merged list is truncated to `pre_rerank_k`;
/// this truncation, not the rerank step, discards long-tail candidates.
pub fn fuse(
    vector_results: Vec<SearchResult>,
    lexical_results: Vec<SearchResult>,
    pre_rerank_k: usize,
) -> Vec<Chunk> {
    let mut order: Vec<String> = Vec::new();
    let mut by_key: HashMap<String, Chunk> = HashMap::new();

    for result in vector_results.into_iter().chain(lexical_results) {
        let chunk = result.chunk;
        let key = if chunk.content_hash.is_empty() {
            chunk.text.clone()
        } else {
            chunk.content_hash.clone()
        };

        if !by_key.contains_key(&key) {
            order.push(key.clone());
        }
        by_key.insert(key, chunk);
    }

    order
        .into_iter()
        .filter_map(|key| by_key.remove(&key))
        .take(pre_rerank_k)
        .collect()
}
