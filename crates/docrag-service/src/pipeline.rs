//! Retrieval + generation pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use docrag_core::{AnswerGenerator, RankedChunk, Result};
use docrag_query::HybridRetriever;

/// Output of one pipeline run.
#[derive(Debug, Clone)]
pub struct AnswerOutput {
    pub question: String,
    pub answer: String,
    pub contexts: Vec<String>,
    pub evidence: Vec<RankedChunk>,
}

/// Retrieves evidence for a question and hands it to the generator.
pub struct AnswerPipeline {
    retriever: Arc<HybridRetriever>,
    generator: Arc<dyn AnswerGenerator>,
}

impl AnswerPipeline {
    pub fn new(retriever: Arc<HybridRetriever>, generator: Arc<dyn AnswerGenerator>) -> Self {
        Self {
            retriever,
            generator,
        }
    }

    pub async fn run(&self, question: &str) -> Result<AnswerOutput> {
        info!("Answer pipeline started");

        let evidence = self.retriever.retrieve(question).await?;
        let contexts: Vec<String> = evidence.iter().map(|r| r.chunk.text.clone()).collect();

        let answer = self.generator.generate(question, &contexts).await?;

        info!("Answer pipeline finished");

        Ok(AnswerOutput {
            question: question.to_string(),
            answer,
            contexts,
            evidence,
        })
    }
}

/// Generator that answers with the highest-ranked evidence text. Stands
/// in for the external language model in offline runs and tests.
pub struct ExtractiveGenerator;

impl ExtractiveGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ExtractiveGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnswerGenerator for ExtractiveGenerator {
    async fn generate(&self, _question: &str, contexts: &[String]) -> Result<String> {
        Ok(contexts
            .first()
            .cloned()
            .unwrap_or_else(|| "Нет релевантных фрагментов в индексе.".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrag_core::{Chunk, ChunkType, Embedder, RetrievalConfig, VectorIndex};
    use docrag_index::{HashEmbedder, LexicalSearch, MemoryVectorIndex, VectorSearch};
    use docrag_query::MockReranker;

    async fn pipeline_over(texts: &[&str]) -> AnswerPipeline {
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::with_dimension(32));
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

        let config = RetrievalConfig::default();
        let retriever = Arc::new(HybridRetriever::new(
            VectorSearch::with_config(embedder, vector, &config),
            Some(lexical),
            Arc::new(MockReranker::new()),
            &config,
        ));

        AnswerPipeline::new(retriever, Arc::new(ExtractiveGenerator::new()))
    }

    #[tokio::test]
    async fn test_pipeline_answers_from_evidence() {
        let pipeline = pipeline_over(&[
            "аренда офисного помещения",
            "срок поставки составляет тридцать дней",
        ])
        .await;

        let output = pipeline.run("срок поставки").await.unwrap();
        assert!(!output.contexts.is_empty());
        assert_eq!(output.answer, output.contexts[0]);
        assert!(output.answer.contains("срок поставки"));
    }

    #[tokio::test]
    async fn test_pipeline_on_empty_corpus() {
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::with_dimension(32));
        let vector = Arc::new(MemoryVectorIndex::new());
        let config = RetrievalConfig::default();
        let retriever = Arc::new(HybridRetriever::new(
            VectorSearch::with_config(embedder, vector, &config),
            None,
            Arc::new(MockReranker::new()),
            &config,
        ));
        let pipeline = AnswerPipeline::new(retriever, Arc::new(ExtractiveGenerator::new()));

        let output = pipeline.run("вопрос").await.unwrap();
        assert!(output.evidence.is_empty());
        assert!(!output.answer.is_empty());
    }
}
