//! Error types for record storage.

use thiserror::Error;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in a record store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing store could not be reached or refused the operation.
    #[error("record store unavailable: {0}")]
    Unavailable(String),

    /// A vector does not fit the store's vector column.
    #[error("vector dimension mismatch: column holds {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The record payload failed validation.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

impl StoreError {
    /// Short label used in structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "storage_error",
            Self::DimensionMismatch { .. } => "configuration_error",
            Self::InvalidRecord(_) => "invalid_record",
        }
    }
}
