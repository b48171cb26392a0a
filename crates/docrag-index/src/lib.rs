//! docrag-index - Search engines for docrag
//!
//! Dense vector search with diversity-aware (MMR) selection over a
//! vector index capability, and sparse BM25 lexical search over an
//! in-memory corpus rebuilt on update.

pub mod embed;
pub mod lexical;
pub mod vector;

pub use embed::HashEmbedder;
pub use lexical::LexicalSearch;
pub use vector::{cosine_similarity, MemoryVectorIndex, VectorSearch};

// Re-export the capability traits for convenience
pub use docrag_core::{Embedder, ScoredVector, VectorIndex};
