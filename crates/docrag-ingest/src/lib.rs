//! docrag-ingest - Ingestion pipeline for docrag
//!
//! Parses office-document text streams into blocks, splits them into
//! bounded overlapping chunks with deterministic identities, and writes
//! the batches into the vector and lexical indexes.

pub mod chunker;
pub mod ingest;
pub mod parser;
pub mod writer;

pub use chunker::Chunker;
pub use ingest::IngestionService;
pub use parser::DocumentParser;
pub use writer::{DualIndexWriter, WriteOutcome};
