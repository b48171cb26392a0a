//! docrag-query - Hybrid retrieval engine for docrag
//!
//! Fuses vector and lexical candidate lists by content identity,
//! reranks the merged set with a cross-encoder relevance model, and
//! truncates to the final evidence count.

pub mod engine;
pub mod fusion;
pub mod rerank;

pub use engine::{HybridRetriever, SearchParams};
pub use fusion::fuse;
pub use rerank::{CrossEncoderReranker, MockReranker, Reranker};
