//! Dual-index writer: upserts chunk batches into the vector index and,
//! when configured, the lexical index, in one shared identity space.

use std::sync::Arc;

use tracing::{debug, info};

use docrag_core::{Chunk, Embedder, Result, VectorIndex};
use docrag_index::LexicalSearch;

/// Outcome of one dual-index write.
#[derive(Debug)]
pub struct WriteOutcome {
    /// Chunks accepted by the vector index.
    pub accepted: Vec<Chunk>,

    /// Whether the lexical index received the batch too. The dual write
    /// is not transactional; false means vector-only.
    pub lexical_indexed: bool,
}

/// Writes chunk batches into both indexes.
///
/// The lexical side is optional: on an empty initial corpus it is absent
/// and added lazily once any document has been ingested. A failure in
/// either sub-write aborts the ingestion for this file; completed
/// sub-writes are not rolled back.
pub struct DualIndexWriter {
    embedder: Arc<dyn Embedder>,
    vector: Arc<dyn VectorIndex>,
    lexical: Option<Arc<LexicalSearch>>,
}

impl DualIndexWriter {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        vector: Arc<dyn VectorIndex>,
        lexical: Option<Arc<LexicalSearch>>,
    ) -> Self {
        Self {
            embedder,
            vector,
            lexical,
        }
    }

    pub async fn write(&self, chunks: Vec<Chunk>) -> Result<WriteOutcome> {
        if chunks.is_empty() {
            return Ok(WriteOutcome {
                accepted: chunks,
                lexical_indexed: self.lexical.is_some(),
            });
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.embedder.embed_documents(&texts).await?;
        debug!("Embedded {} chunks", embeddings.len());

        self.vector.upsert(&chunks, &embeddings).await?;

        let lexical_indexed = match &self.lexical {
            Some(lexical) => {
                lexical.add(chunks.clone()).await?;
                true
            }
            None => {
                debug!("No lexical index configured, vector-only write");
                false
            }
        };

        info!(
            "Wrote {} chunks (lexical: {})",
            chunks.len(),
            lexical_indexed
        );

        Ok(WriteOutcome {
            accepted: chunks,
            lexical_indexed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docrag_core::{ChunkType, DocragError, ScoredVector};
    use docrag_index::{HashEmbedder, MemoryVectorIndex};

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
    async fn test_write_to_both_indexes() {
        let vector = Arc::new(MemoryVectorIndex::new());
        let lexical = Arc::new(LexicalSearch::new());
        let writer = DualIndexWriter::new(
            Arc::new(HashEmbedder::with_dimension(32)),
            vector.clone(),
            Some(lexical.clone()),
        );

        let outcome = writer
            .write(vec![chunk("первый", 0), chunk("второй", 1)])
            .await
            .unwrap();

        assert_eq!(outcome.accepted.len(), 2);
        assert!(outcome.lexical_indexed);
        assert_eq!(vector.all_chunks().await.unwrap().len(), 2);
        assert_eq!(lexical.len().await, 2);
    }

    #[tokio::test]
    async fn test_vector_only_when_lexical_absent() {
        let vector = Arc::new(MemoryVectorIndex::new());
        let writer = DualIndexWriter::new(
            Arc::new(HashEmbedder::with_dimension(32)),
            vector.clone(),
            None,
        );

        let outcome = writer.write(vec![chunk("одинокий", 0)]).await.unwrap();
        assert!(!outcome.lexical_indexed);
        assert_eq!(vector.all_chunks().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reingest_upserts_without_duplicates() {
        let vector = Arc::new(MemoryVectorIndex::new());
        let writer = DualIndexWriter::new(
            Arc::new(HashEmbedder::with_dimension(32)),
            vector.clone(),
            None,
        );

        writer.write(vec![chunk("тот же текст", 0)]).await.unwrap();
        writer.write(vec![chunk("тот же текст", 0)]).await.unwrap();

        assert_eq!(vector.all_chunks().await.unwrap().len(), 1);
    }

    struct FailingIndex;

    #[async_trait]
    impl VectorIndex for FailingIndex {
        async fn upsert(&self, _: &[Chunk], _: &[Vec<f32>]) -> Result<()> {
            Err(DocragError::vector_index("index unreachable"))
        }
        async fn nearest(&self, _: &[f32], _: usize) -> Result<Vec<ScoredVector>> {
            Err(DocragError::vector_index("index unreachable"))
        }
        async fn all_chunks(&self) -> Result<Vec<Chunk>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_vector_failure_aborts_before_lexical() {
        let lexical = Arc::new(LexicalSearch::new());
        let writer = DualIndexWriter::new(
            Arc::new(HashEmbedder::with_dimension(32)),
            Arc::new(FailingIndex),
            Some(lexical.clone()),
        );

        let err = writer.write(vec![chunk("текст", 0)]).await.unwrap_err();
        assert_eq!(err.error_code(), "VECTOR_INDEX_ERROR");
        // The lexical index never saw the batch.
        assert!(lexical.is_empty().await);
    }
}
