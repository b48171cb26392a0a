//! Per-file ingestion: hash, parse, chunk, write to both indexes.

use std::path::Path;

use tracing::info;

use docrag_core::{identity, ChunkingConfig, IngestReport, Result};

use crate::chunker::Chunker;
use crate::parser::DocumentParser;
use crate::writer::DualIndexWriter;

/// Identifier reported for the block parser.
const PARSER_NAME: &str = "DocumentParser";

/// Ingestion service for one vector/lexical index pair.
pub struct IngestionService {
    parser: DocumentParser,
    chunker: Chunker,
    writer: DualIndexWriter,
}

impl IngestionService {
    pub fn new(parser: DocumentParser, chunker: Chunker, writer: DualIndexWriter) -> Self {
        Self {
            parser,
            chunker,
            writer,
        }
    }

    pub fn with_config(config: &ChunkingConfig, writer: DualIndexWriter) -> Self {
        Self::new(DocumentParser::new(), Chunker::from_config(config), writer)
    }

    /// Ingest one file under its declared filename.
    ///
    /// Re-ingesting an unchanged file produces byte-identical chunk ids
    /// and hashes and upserts over the existing records.
    pub async fn ingest_file(&self, path: impl AsRef<Path>, filename: &str) -> Result<IngestReport> {
        let path = path.as_ref();
        info!("Ingesting file: {}", filename);

        let file_hash = identity::file_hash(path)?;
        let blocks = self.parser.parse_file(path)?;
        let chunks = self.chunker.chunk(&blocks, filename, &file_hash);

        let outcome = self.writer.write(chunks).await?;

        info!(
            "Ingestion finished: blocks={}, chunks={}",
            blocks.len(),
            outcome.accepted.len()
        );

        Ok(IngestReport {
            documents: blocks.len(),
            chunks: outcome.accepted.len(),
            file_hash,
            parser: PARSER_NAME.to_string(),
            lexical_indexed: outcome.lexical_indexed,
        })
    }
}
