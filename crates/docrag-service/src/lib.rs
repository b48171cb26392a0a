//! docrag-service - Service surface for docrag
//!
//! Typed operations consumed by the thin transport layer: file upload
//! with ingestion, background question processing tracked in a
//! key-value job store, and status polling.

pub mod jobs;
pub mod pipeline;
pub mod service;

pub use jobs::{JobStatus, JobStore, QuestionRecord};
pub use pipeline::{AnswerOutput, AnswerPipeline, ExtractiveGenerator};
pub use service::{
    AskRequest, AskResponse, DocragService, HealthResponse, QuestionStatusResponse,
    SearchRequest, UploadResponse,
};
