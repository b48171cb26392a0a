//! Configuration types for the docrag system.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for the docrag system.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocragConfig {
    /// Chunking configuration.
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Retrieval configuration.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Reranker configuration.
    #[serde(default)]
    pub reranker: RerankerConfig,

    /// Service configuration.
    #[serde(default)]
    pub service: ServiceConfig,
}

/// Chunking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Target chunk length in characters.
    #[serde(default = "default_max_size")]
    pub max_size: usize,

    /// Overlap between consecutive chunks in characters.
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_size: 1200,
            overlap: 300,
        }
    }
}

/// Retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Results selected by the vector search after diversity selection.
    #[serde(default = "default_k")]
    pub k: usize,

    /// Nearest neighbors fetched before diversity selection. Always >= k.
    #[serde(default = "default_fetch_k")]
    pub fetch_k: usize,

    /// Candidates kept after fusion, before reranking.
    #[serde(default = "default_pre_rerank_k")]
    pub pre_rerank_k: usize,

    /// Final result count after reranking.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Relevance/diversity balance for MMR selection (1 = relevance only).
    #[serde(default = "default_mmr_lambda")]
    pub mmr_lambda: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: 5,
            fetch_k: 50,
            pre_rerank_k: 30,
            top_k: 5,
            mmr_lambda: 0.5,
        }
    }
}

/// Reranker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerConfig {
    /// Path to the ONNX cross-encoder model file.
    pub model_path: PathBuf,

    /// Path to the tokenizer.json file.
    pub tokenizer_path: PathBuf,

    /// Token truncation length for (query, candidate) pairs.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Number of threads for CPU inference.
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        let model_dir = default_model_dir();
        Self {
            model_path: model_dir.join("reranker.onnx"),
            tokenizer_path: model_dir.join("tokenizer.json"),
            max_tokens: 512,
            num_threads: 4,
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Path to the job-status store database.
    pub jobs_db_path: PathBuf,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            jobs_db_path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("docrag")
                .join("jobs.db"),
        }
    }
}

// Default value functions

fn default_max_size() -> usize {
    1200
}

fn default_overlap() -> usize {
    300
}

fn default_k() -> usize {
    5
}

fn default_fetch_k() -> usize {
    50
}

fn default_pre_rerank_k() -> usize {
    30
}

fn default_top_k() -> usize {
    5
}

fn default_mmr_lambda() -> f32 {
    0.5
}

fn default_max_tokens() -> usize {
    512
}

fn default_num_threads() -> usize {
    4
}

fn default_model_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("docrag")
        .join("models")
}

impl DocragConfig {
    /// Load configuration from file.
    pub fn load(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            crate::error::DocragError::Config {
                message: format!("Failed to parse config: {}", e),
            }
        })?;
        Ok(config)
    }

    /// Load configuration from default paths.
    pub fn load_default() -> crate::error::Result<Self> {
        // Try user config first
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("docrag").join("config.toml");
            if user_config.exists() {
                return Self::load(&user_config);
            }
        }

        // Try local config
        let local_config = PathBuf::from("docrag.toml");
        if local_config.exists() {
            return Self::load(&local_config);
        }

        // Return defaults
        Ok(Self::default())
    }
}
