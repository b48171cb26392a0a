//! Typed service surface: upload, ask, status, health.
//!
//! The HTTP layer is a thin external collaborator; these typed
//! operations are everything it consumes.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use docrag_core::{DocragError, IngestReport, RankedChunk, Result};
use docrag_ingest::IngestionService;
use docrag_query::{HybridRetriever, SearchParams};

use crate::jobs::{JobStatus, JobStore, QuestionRecord};
use crate::pipeline::AnswerPipeline;

/// Response to a file upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub file_id: String,
    pub status: String,
    pub report: IngestReport,
}

/// A question about an uploaded file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    pub file_id: String,
    pub question: String,
}

/// Acknowledgement that question processing started.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    pub question_id: String,
    pub status: JobStatus,
}

/// Current state of a question job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionStatusResponse {
    pub question_id: String,
    pub status: JobStatus,
    pub answer: Option<String>,
    pub error: Option<String>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// A retrieval-only request with optional per-request tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub k: Option<usize>,
    #[serde(default)]
    pub fetch_k: Option<usize>,
    #[serde(default)]
    pub pre_rerank_k: Option<usize>,
    #[serde(default)]
    pub top_k: Option<usize>,
}

impl SearchRequest {
    pub fn query(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            k: None,
            fetch_k: None,
            pre_rerank_k: None,
            top_k: None,
        }
    }
}

/// The docrag service facade.
pub struct DocragService {
    ingestion: IngestionService,
    retriever: Arc<HybridRetriever>,
    pipeline: Arc<AnswerPipeline>,
    jobs: Arc<JobStore>,
}

impl DocragService {
    pub fn new(
        ingestion: IngestionService,
        retriever: Arc<HybridRetriever>,
        pipeline: Arc<AnswerPipeline>,
        jobs: Arc<JobStore>,
    ) -> Self {
        Self {
            ingestion,
            retriever,
            pipeline,
            jobs,
        }
    }

    /// Retrieve the evidence set for a query without generation.
    pub async fn search(&self, request: SearchRequest) -> Result<Vec<RankedChunk>> {
        let params = SearchParams {
            k: request.k,
            fetch_k: request.fetch_k,
            pre_rerank_k: request.pre_rerank_k,
            top_k: request.top_k,
        };
        self.retriever.retrieve_with(&request.query, &params).await
    }

    /// Ingest a file under its declared filename and return its id and
    /// ingestion report.
    pub async fn upload(&self, path: impl AsRef<Path>, filename: &str) -> Result<UploadResponse> {
        info!("Uploading file: {}", filename);

        let file_id = self.jobs.next_file_id()?;
        let report = self.ingestion.ingest_file(path, filename).await?;

        Ok(UploadResponse {
            file_id,
            status: "uploaded".to_string(),
            report,
        })
    }

    /// Register a question job and process it in the background. The
    /// caller polls `status` for the answer.
    pub async fn ask(&self, request: AskRequest) -> Result<AskResponse> {
        let question_id = self.jobs.next_question_id()?;

        let record = QuestionRecord::new(
            question_id.clone(),
            request.file_id,
            request.question.clone(),
        );
        self.jobs.create_question(&record)?;

        let pipeline = Arc::clone(&self.pipeline);
        let jobs = Arc::clone(&self.jobs);
        let job_id = question_id.clone();
        let question = request.question;

        tokio::spawn(async move {
            match pipeline.run(&question).await {
                Ok(output) => {
                    if let Err(e) = jobs.complete_question(&job_id, &output.answer) {
                        error!("Failed to store answer for question {}: {}", job_id, e);
                    }
                }
                Err(e) => {
                    error!("Question {} processing failed: {}", job_id, e);
                    if let Err(store_err) = jobs.fail_question(&job_id, &e.to_string()) {
                        error!(
                            "Failed to store error for question {}: {}",
                            job_id, store_err
                        );
                    }
                }
            }
        });

        Ok(AskResponse {
            question_id,
            status: JobStatus::Processing,
        })
    }

    /// Read the processing state or the finished answer of a question.
    pub fn status(&self, question_id: &str) -> Result<QuestionStatusResponse> {
        let record = self
            .jobs
            .get_question(question_id)?
            .ok_or_else(|| DocragError::JobNotFound {
                id: question_id.to_string(),
            })?;

        Ok(QuestionStatusResponse {
            question_id: record.question_id,
            status: record.status,
            answer: record.answer,
            error: record.error,
        })
    }

    /// Service liveness check.
    pub fn health(&self) -> HealthResponse {
        HealthResponse {
            status: "OK".to_string(),
        }
    }
}
