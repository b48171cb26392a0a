//! Core domain types for the docrag system.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity;

/// Kind of a parsed block or chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    Paragraph,
    Table,
}

impl std::fmt::Display for ChunkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Paragraph => "paragraph",
            Self::Table => "table",
        };
        write!(f, "{}", s)
    }
}

/// A semantic block produced by the document parser.
///
/// Ephemeral: consumed immediately by the chunker, never persisted.
#[derive(Debug, Clone)]
pub struct Block {
    /// Block text, lines joined with newlines.
    pub text: String,

    /// Paragraph or table.
    pub block_type: ChunkType,

    /// Nearest preceding section heading, if any.
    pub section: Option<String>,
}

impl Block {
    /// Create a paragraph block.
    pub fn paragraph(text: impl Into<String>, section: Option<String>) -> Self {
        Self {
            text: text.into(),
            block_type: ChunkType::Paragraph,
            section,
        }
    }

    /// Create an atomic table block.
    pub fn table(text: impl Into<String>, section: Option<String>) -> Self {
        Self {
            text: text.into(),
            block_type: ChunkType::Table,
            section,
        }
    }
}

/// The unit of retrieval: a normalized piece of text or a whole table,
/// with a deterministic content-derived identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// UUIDv5 over the normalized text. The cross-index join key.
    pub id: Uuid,

    /// Normalized content (whitespace collapsed, soft hyphens stripped).
    pub text: String,

    /// Paragraph or table.
    pub chunk_type: ChunkType,

    /// Atomic chunks (tables) are never subdivided or merged.
    pub is_atomic: bool,

    /// Nearest preceding section heading at parse time.
    pub section: Option<String>,

    /// Source filename as declared at ingestion.
    pub source: String,

    /// SHA-256 hex digest of the raw source file bytes.
    pub file_hash: String,

    /// Monotonic position within the file for one ingestion run.
    pub chunk_index: u32,

    /// SHA-256 hex digest of the normalized text. Dedup key.
    pub content_hash: String,

    /// Start offset of a paragraph chunk within its source block text
    /// (None for tables).
    pub start_index: Option<usize>,
}

impl Chunk {
    /// Build a chunk from raw text, normalizing and deriving identity.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        text: &str,
        chunk_type: ChunkType,
        is_atomic: bool,
        section: Option<String>,
        source: &str,
        file_hash: &str,
        chunk_index: u32,
        start_index: Option<usize>,
    ) -> Self {
        let normalized = identity::normalize_text(text);
        let content_hash = identity::content_hash(&normalized);
        let id = identity::chunk_id(&normalized);

        Self {
            id,
            text: normalized,
            chunk_type,
            is_atomic,
            section,
            source: source.to_string(),
            file_hash: file_hash.to_string(),
            chunk_index,
            content_hash,
            start_index,
        }
    }
}

/// Which engine produced a pre-fusion search result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Vector,
    Lexical,
}

/// A scored candidate produced before fusion, discarded after.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunk: Chunk,
    pub score: f32,
    pub origin: Origin,
}

/// A chunk after reranking. `score` is None when the reranker was not
/// loaded and the candidate passed through unscored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedChunk {
    pub chunk: Chunk,
    pub score: Option<f32>,
}

impl RankedChunk {
    /// An unscored pass-through candidate.
    pub fn unscored(chunk: Chunk) -> Self {
        Self { chunk, score: None }
    }

    /// A candidate scored by the relevance model.
    pub fn scored(chunk: Chunk, score: f32) -> Self {
        Self {
            chunk,
            score: Some(score),
        }
    }
}

/// Summary returned to the caller after ingesting one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    /// Number of parsed blocks.
    pub documents: usize,

    /// Number of chunks written.
    pub chunks: usize,

    /// SHA-256 hex digest of the raw file.
    pub file_hash: String,

    /// Parser identifier.
    pub parser: String,

    /// Whether the lexical index was updated too. The dual write is not
    /// atomic across indexes; false means vector-only ingestion.
    pub lexical_indexed: bool,
}
