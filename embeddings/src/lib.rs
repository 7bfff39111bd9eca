//! # Embeddings
//!
//! Text-to-vector plumbing for Peoplepad semantic search.
//!
//! ## Features
//!
//! - **Providers**: HTTP client for the embedding service (single, batch,
//!   metadata and health routes)
//! - **Retry**: exponential backoff for transient failures only
//! - **Caching**: process-local memo keyed by content hash
//! - **Distance**: cosine and L2 metrics shared by index and query
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingClient ──► EmbeddingCache (hit: return)              │
//! │       │                                                         │
//! │       ▼ miss                                                    │
//! │  RetryPolicy ──► EmbeddingProvider (HttpProvider)              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod client;
pub mod error;
pub mod provider;
pub mod retry;
pub mod similarity;

pub use cache::{CacheStats, EmbeddingCache};
pub use client::{EmbeddingClient, MAX_BATCH_SIZE, preview};
pub use error::{EmbeddingError, Result};
pub use provider::{BatchInput, BatchOutput, EmbeddingProvider, HttpProvider, ProviderMetadata};
pub use retry::RetryPolicy;
pub use similarity::{DistanceMetric, cosine_similarity, euclidean_distance, normalize};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Dimension of embeddings (all-mpnet-base-v2).
pub const DEFAULT_DIMENSION: usize = 768;
