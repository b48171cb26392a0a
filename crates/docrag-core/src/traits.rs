//! Core traits defining the interfaces between components.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Chunk;

/// Embedding model trait. The embedding service is an external
/// collaborator; failures surface as `DocragError::Embedding`.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of chunk texts.
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;
}

/// A chunk held by the vector index together with its stored embedding
/// and similarity to the query.
#[derive(Debug, Clone)]
pub struct ScoredVector {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
    pub similarity: f32,
}

/// Dense vector index capability. The backing engine is treated as an
/// external service with its own concurrency guarantees; this core
/// imposes no additional locking on it.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Upsert chunks with their embeddings. Records share the chunk id
    /// space, so re-ingesting identical content overwrites in place.
    async fn upsert(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()>;

    /// Return up to `fetch_k` nearest neighbors by similarity, best first,
    /// each with its stored embedding (needed for diversity selection).
    async fn nearest(&self, embedding: &[f32], fetch_k: usize) -> Result<Vec<ScoredVector>>;

    /// Dump all stored chunks (used to warm-start the lexical index).
    async fn all_chunks(&self) -> Result<Vec<Chunk>>;
}

/// Downstream answer generator. Prompting internals are out of scope;
/// the pipeline hands it the question and the evidence texts.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, question: &str, contexts: &[String]) -> Result<String>;
}
