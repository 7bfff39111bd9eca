//! Error types for the Peoplepad retrieval engine.

use peoplepad_embeddings::EmbeddingError;
use peoplepad_records::StoreError;
use thiserror::Error;

/// Result type alias for engine setup and maintenance operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Errors raised while configuring or maintaining the engine.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// Embedding error.
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Record store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Config file could not be parsed.
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned to search callers.
#[derive(Error, Debug)]
pub enum SearchError {
    /// The query text is empty or whitespace.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The query could not be embedded.
    #[error("search unavailable: embedding service: {0}")]
    Upstream(#[from] EmbeddingError),

    /// The record store failed.
    #[error("search unavailable: record store: {0}")]
    Storage(#[from] StoreError),
}

impl SearchError {
    /// Whether the failure is a dependency outage rather than a bad request.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Upstream(_) | Self::Storage(_))
    }

    /// Short label used in structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidQuery(_) => "invalid_query",
            Self::Upstream(err) => err.kind(),
            Self::Storage(err) => err.kind(),
        }
    }
}
