//! Error types for CourseBuddy
//!
//! Every failure the retrieval core can surface maps onto one variant here.
//! Nothing is retried or recovered locally; errors travel to the caller.

use thiserror::Error;

/// Main error type for the retrieval and answering pipeline
#[derive(Error, Debug)]
pub enum RagError {
    /// Document source could not be read (missing file, failed HTTP fetch)
    #[error("Document source unavailable: {source_name}: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    /// Document JSON did not have the expected per-course shape
    #[error("Malformed document data in {source_name}: {reason}")]
    MalformedData { source_name: String, reason: String },

    /// Search store unreachable or the request was rejected
    #[error("Search store unavailable: {0}")]
    StoreUnavailable(String),

    /// Embedding or term-weighting step failed
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// Language model call failed
    #[error("Generation failed: {0}")]
    Generation(String),

    /// Query rejected before reaching the store
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, RagError>;

impl RagError {
    pub fn source_unavailable(source: impl Into<String>, reason: impl ToString) -> Self {
        RagError::SourceUnavailable {
            source_name: source.into(),
            reason: reason.to_string(),
        }
    }

    pub fn malformed(source: impl Into<String>, reason: impl ToString) -> Self {
        RagError::MalformedData {
            source_name: source.into(),
            reason: reason.to_string(),
        }
    }
}
