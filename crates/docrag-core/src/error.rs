//! Error types for the docrag system.

use thiserror::Error;

/// Result type alias using DocragError.
pub type Result<T> = std::result::Result<T, DocragError>;

/// Errors that can occur in the docrag system.
///
/// A reranker without a loaded model is deliberately NOT represented here:
/// scoring degrades to an unscored pass-through and is only logged.
#[derive(Error, Debug)]
pub enum DocragError {
    /// Source document unreadable or corrupt. Fatal for the ingestion;
    /// no partial chunks are committed.
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// Embedding service unreachable or rejected the input.
    #[error("Embedding error: {message}")]
    Embedding { message: String },

    /// Vector index unavailable or corrupt.
    #[error("Vector index error: {message}")]
    VectorIndex { message: String },

    /// Lexical index failure (rebuild or scoring).
    #[error("Lexical index error: {message}")]
    LexicalIndex { message: String },

    /// Answer generation failed.
    #[error("Generation error: {message}")]
    Generation { message: String },

    /// Question job not found in the job store.
    #[error("Job not found: {id}")]
    JobNotFound { id: String },

    /// Invalid argument provided.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Job store database error.
    #[error("Database error: {message}")]
    Database { message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Internal error (unexpected).
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DocragError {
    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Create an embedding error.
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            message: message.into(),
        }
    }

    /// Create a vector index error.
    pub fn vector_index(message: impl Into<String>) -> Self {
        Self::VectorIndex {
            message: message.into(),
        }
    }

    /// Create a lexical index error.
    pub fn lexical_index(message: impl Into<String>) -> Self {
        Self::LexicalIndex {
            message: message.into(),
        }
    }

    /// Create a generation error.
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the error code for service responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "PARSE_ERROR",
            Self::Embedding { .. } => "EMBEDDING_ERROR",
            Self::VectorIndex { .. } => "VECTOR_INDEX_ERROR",
            Self::LexicalIndex { .. } => "LEXICAL_INDEX_ERROR",
            Self::Generation { .. } => "GENERATION_ERROR",
            Self::JobNotFound { .. } => "JOB_NOT_FOUND",
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::Database { .. } => "DATABASE_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DocragError::JobNotFound {
            id: "q-42".to_string(),
        };
        assert!(err.to_string().contains("q-42"));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(DocragError::parse("bad file").error_code(), "PARSE_ERROR");
        assert_eq!(
            DocragError::lexical_index("rebuild failed").error_code(),
            "LEXICAL_INDEX_ERROR"
        );
        assert_eq!(DocragError::database("locked").error_code(), "DATABASE_ERROR");
    }
}
