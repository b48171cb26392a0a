//! Cross-encoder relevance reranker with an explicit resource lifecycle.
//!
//! The model moves through Unloaded -> Loading -> Loaded. A failed load
//! is logged and leaves the component unusable rather than propagating:
//! scoring then degrades to an unscored pass-through, which callers must
//! tolerate (reranking is never guaranteed to reorder).

use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use ndarray::ArrayViewD;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, error, info, warn};

use docrag_core::{Chunk, DocragError, RankedChunk, RerankerConfig, Result};

/// Scores (query, candidate) pairs and returns the candidates sorted by
/// descending relevance. Implementations never drop or add candidates.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(&self, query: &str, candidates: Vec<Chunk>) -> Result<Vec<RankedChunk>>;
}

enum RerankerState {
    Unloaded,
    Loading,
    Loaded(Arc<LoadedModel>),
}

struct LoadedModel {
    /// ONNX inference session (Mutex for interior mutability).
    session: Mutex<Session>,

    /// Tokenizer configured with pair truncation.
    tokenizer: Tokenizer,
}

/// ONNX cross-encoder reranker (sequence-classification head producing
/// one relevance logit per pair).
pub struct CrossEncoderReranker {
    config: RerankerConfig,
    state: RwLock<RerankerState>,
}

impl CrossEncoderReranker {
    /// Create the reranker in the Unloaded state. No model files are
    /// touched until `load`.
    pub fn new(config: RerankerConfig) -> Self {
        Self {
            config,
            state: RwLock::new(RerankerState::Unloaded),
        }
    }

    /// Materialize the model and tokenizer. On failure the error is
    /// logged and the component stays Unloaded; scoring degrades to
    /// pass-through instead of failing requests.
    pub fn load(&self) {
        debug!("Loading reranker model from {:?}", self.config.model_path);

        {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            *state = RerankerState::Loading;
        }

        let loaded = match self.materialize() {
            Ok(model) => {
                info!("Reranker model loaded");
                RerankerState::Loaded(Arc::new(model))
            }
            Err(e) => {
                error!("Failed to load reranker model: {}", e);
                RerankerState::Unloaded
            }
        };

        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        *state = loaded;
    }

    /// Release the model and its tokenizer. Scoring afterwards degrades
    /// to pass-through.
    pub fn unload(&self) {
        debug!("Unloading reranker model");
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        *state = RerankerState::Unloaded;
    }

    pub fn is_loaded(&self) -> bool {
        matches!(
            *self.state.read().unwrap_or_else(|e| e.into_inner()),
            RerankerState::Loaded(_)
        )
    }

    fn materialize(&self) -> Result<LoadedModel> {
        let session = Session::builder()
            .map_err(|e| DocragError::internal(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| DocragError::internal(format!("Failed to set optimization level: {}", e)))?
            .with_intra_threads(self.config.num_threads)
            .map_err(|e| DocragError::internal(format!("Failed to set thread count: {}", e)))?
            .commit_from_file(&self.config.model_path)
            .map_err(|e| DocragError::internal(format!("Failed to load model: {}", e)))?;

        let mut tokenizer = Tokenizer::from_file(&self.config.tokenizer_path)
            .map_err(|e| DocragError::internal(format!("Failed to load tokenizer: {}", e)))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: self.config.max_tokens,
                ..Default::default()
            }))
            .map_err(|e| DocragError::internal(format!("Failed to configure truncation: {}", e)))?;

        Ok(LoadedModel {
            session: Mutex::new(session),
            tokenizer,
        })
    }

    fn current_model(&self) -> Option<Arc<LoadedModel>> {
        match &*self.state.read().unwrap_or_else(|e| e.into_inner()) {
            RerankerState::Loaded(model) => Some(Arc::clone(model)),
            _ => None,
        }
    }
}

impl LoadedModel {
    /// Score all (query, text) pairs in one padded batch. One relevance
    /// logit per pair.
    fn score_pairs(&self, query: &str, texts: &[String]) -> Result<Vec<f32>> {
        let pairs: Vec<(String, String)> = texts
            .iter()
            .map(|t| (query.to_string(), t.clone()))
            .collect();

        let encodings = self
            .tokenizer
            .encode_batch(pairs, true)
            .map_err(|e| DocragError::internal(format!("Tokenization failed: {}", e)))?;

        let batch_size = encodings.len();
        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);

        debug!("Reranker batch: size={}, max_len={}", batch_size, max_len);

        let mut input_ids = vec![0i64; batch_size * max_len];
        let mut attention_mask = vec![0i64; batch_size * max_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            for j in 0..ids.len().min(max_len) {
                input_ids[i * max_len + j] = ids[j] as i64;
                attention_mask[i * max_len + j] = mask[j] as i64;
            }
        }

        let input_ids_tensor = Tensor::from_array((vec![batch_size, max_len], input_ids))
            .map_err(|e| DocragError::internal(format!("Failed to create input tensor: {}", e)))?;
        let attention_mask_tensor = Tensor::from_array((vec![batch_size, max_len], attention_mask))
            .map_err(|e| DocragError::internal(format!("Failed to create mask tensor: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| DocragError::internal(format!("Failed to lock session: {}", e)))?;

        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor
            ])
            .map_err(|e| DocragError::internal(format!("Inference failed: {}", e)))?;

        let (_, output) = outputs
            .iter()
            .next()
            .ok_or_else(|| DocragError::internal("No output tensor found"))?;

        let view = output
            .try_extract_array::<f32>()
            .map_err(|e| DocragError::internal(format!("Failed to extract logits: {}", e)))?;

        extract_logits(&view, batch_size)
    }
}

/// Pull one scalar logit per pair out of a `[batch, 1]` or `[batch]`
/// shaped output.
fn extract_logits(view: &ArrayViewD<'_, f32>, batch_size: usize) -> Result<Vec<f32>> {
    let shape = view.shape();
    match shape {
        [b, 1] if *b == batch_size => Ok((0..batch_size).map(|i| view[[i, 0]]).collect()),
        [b] if *b == batch_size => Ok((0..batch_size).map(|i| view[[i]]).collect()),
        other => Err(DocragError::internal(format!(
            "Unexpected logits shape: {:?}",
            other
        ))),
    }
}

/// Sort candidates by descending score, stably: ties keep the input
/// relative order.
fn sort_by_scores(candidates: Vec<Chunk>, scores: Vec<f32>) -> Vec<RankedChunk> {
    let mut ranked: Vec<RankedChunk> = candidates
        .into_iter()
        .zip(scores)
        .map(|(chunk, score)| RankedChunk::scored(chunk, score))
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    ranked
}

#[async_trait]
impl Reranker for CrossEncoderReranker {
    async fn rerank(&self, query: &str, candidates: Vec<Chunk>) -> Result<Vec<RankedChunk>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let Some(model) = self.current_model() else {
            warn!("Reranker model not loaded, passing {} candidates through unscored", candidates.len());
            return Ok(candidates.into_iter().map(RankedChunk::unscored).collect());
        };

        // Inference is CPU/accelerator-bound; keep it off the request task.
        let query_owned = query.to_string();
        let texts: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
        let scores = tokio::task::spawn_blocking(move || model.score_pairs(&query_owned, &texts))
            .await
            .map_err(|e| DocragError::internal(format!("scoring task failed: {}", e)))??;

        Ok(sort_by_scores(candidates, scores))
    }
}

/// Deterministic reranker for tests and offline runs: scores each
/// candidate by query-term overlap.
pub struct MockReranker;

impl MockReranker {
    pub fn new() -> Self {
        Self
    }

    fn overlap_score(query: &str, text: &str) -> f32 {
        let text_lower = text.to_lowercase();
        query
            .split_whitespace()
            .filter(|term| text_lower.contains(&term.to_lowercase()))
            .count() as f32
    }
}

impl Default for MockReranker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Reranker for MockReranker {
    async fn rerank(&self, query: &str, candidates: Vec<Chunk>) -> Result<Vec<RankedChunk>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let scores: Vec<f32> = candidates
            .iter()
            .map(|c| Self::overlap_score(query, &c.text))
            .collect();

        Ok(sort_by_scores(candidates, scores))
    }
}
