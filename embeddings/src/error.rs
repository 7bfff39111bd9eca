//! Error types for the embeddings system.

use thiserror::Error;

/// Result type alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Errors that can occur while computing embeddings.
///
/// Every variant is either transient (worth retrying) or permanent. Use
/// [`EmbeddingError::is_transient`] rather than matching variants when
/// deciding whether to retry.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Provider not configured (no service URL or credential).
    #[error("embedding provider not configured")]
    ProviderNotConfigured,

    /// The request never produced a response (DNS, refused, reset...).
    #[error("connection to embedding service failed: {0}")]
    Connection(String),

    /// The request exceeded its per-attempt timeout.
    #[error("embedding request timed out")]
    Timeout,

    /// The service answered with a 5xx status.
    #[error("embedding service error {status}: {body}")]
    Server { status: u16, body: String },

    /// Rate limit exceeded.
    #[error("rate limit exceeded")]
    RateLimited,

    /// The service rejected the request (4xx other than 429).
    #[error("embedding request rejected {status}: {body}")]
    Client { status: u16, body: String },

    /// Invalid response from provider.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Dimension mismatch.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Batch exceeds the provider's item cap.
    #[error("batch too large: {size} items, max {max}")]
    BatchTooLarge { size: usize, max: usize },

    /// A transient failure persisted through every retry.
    #[error("embedding failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<EmbeddingError>,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EmbeddingError {
    /// Whether retrying the same request could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection(_)
            | Self::Timeout
            | Self::Server { .. }
            | Self::RateLimited
            | Self::RetriesExhausted { .. } => true,
            Self::ProviderNotConfigured
            | Self::Client { .. }
            | Self::InvalidResponse(_)
            | Self::DimensionMismatch { .. }
            | Self::BatchTooLarge { .. }
            | Self::Serialization(_) => false,
        }
    }

    /// Short label used in structured log fields.
    pub fn kind(&self) -> &'static str {
        if self.is_transient() {
            "transient_provider_error"
        } else {
            "permanent_provider_error"
        }
    }
}

impl From<reqwest::Error> for EmbeddingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout;
        }
        if err.is_decode() {
            return Self::InvalidResponse(err.to_string());
        }
        if let Some(status) = err.status() {
            let status = status.as_u16();
            return if status >= 500 {
                Self::Server {
                    status,
                    body: String::new(),
                }
            } else {
                Self::Client {
                    status,
                    body: String::new(),
                }
            };
        }
        if err.is_builder() {
            return Self::ProviderNotConfigured;
        }
        // Connect, request and body errors never reached a verdict from the service.
        Self::Connection(err.without_url().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(EmbeddingError::Timeout.is_transient());
        assert!(EmbeddingError::Connection("refused".into()).is_transient());
        assert!(
            EmbeddingError::Server {
                status: 503,
                body: String::new()
            }
            .is_transient()
        );
        assert!(EmbeddingError::RateLimited.is_transient());

        assert!(
            !EmbeddingError::Client {
                status: 401,
                body: "Invalid API key".into()
            }
            .is_transient()
        );
        assert!(!EmbeddingError::BatchTooLarge { size: 101, max: 100 }.is_transient());
        assert!(
            !EmbeddingError::DimensionMismatch {
                expected: 768,
                actual: 384
            }
            .is_transient()
        );
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(EmbeddingError::Timeout.kind(), "transient_provider_error");
        assert_eq!(
            EmbeddingError::InvalidResponse("empty".into()).kind(),
            "permanent_provider_error"
        );
    }
}
