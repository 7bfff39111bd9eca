//! # Peoplepad Retrieval
//!
//! Semantic search over a user's contact records:
//!
//! - **Write path**: record writes commit immediately and schedule an
//!   embedding job for the notes
//! - **Jobs**: a background queue that embeds notes and stores the vector
//! - **Search**: embeds the query and ranks the user's records by distance,
//!   optionally filtered by creation date and tag prefix
//! - **Backfill**: re-embeds records that have notes but no vector
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Peoplepad Engine                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  RecordService ──► RecordStore        SimilaritySearchEngine    │
//! │       │                ▲                   │          │         │
//! │       ▼ enqueue        │ write             │ embed    │ nearest │
//! │  EmbeddingJobQueue ────┘                   ▼          ▼         │
//! │       │                              EmbeddingClient  RecordStore│
//! │       ▼ embed                              │                    │
//! │  EmbeddingClient ──► EmbeddingCache ──► EmbeddingProvider       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use peoplepad_retrieval::{Peoplepad, PeoplepadConfig, RecordDraft, SearchFilter};
//!
//! let engine = Peoplepad::builder()
//!     .with_config(PeoplepadConfig::load("peoplepad.toml")?)
//!     .with_verify_provider(true)
//!     .build()
//!     .await?;
//!
//! engine
//!     .records()
//!     .create(user_id, RecordDraft::new("John Doe").with_notes("Met at conference, works in AI"))
//!     .await?;
//!
//! let hits = engine
//!     .search(user_id, "AI conference", SearchFilter::for_owner(user_id))
//!     .await?;
//! ```

pub mod backfill;
pub mod config;
pub mod engine;
pub mod error;
pub mod jobs;
pub mod search;
pub mod service;

pub use backfill::{Backfill, BackfillReport};
pub use config::{EmbeddingConfig, JobConfig, PeoplepadConfig, SearchConfig};
pub use engine::{EngineStats, Peoplepad, PeoplepadBuilder};
pub use error::{Result, RetrievalError, SearchError};
pub use jobs::{EmbeddingJobQueue, EmbeddingUpdateJob, JobOutcome, JobStats};
pub use search::{SearchRequest, SimilaritySearchEngine};
pub use service::RecordService;

// Re-export from dependencies for convenience
pub use peoplepad_embeddings::{
    DistanceMetric, EmbeddingCache, EmbeddingClient, EmbeddingError, EmbeddingProvider,
    HttpProvider,
};
pub use peoplepad_records::{
    InMemoryRecordStore, Record, RecordDraft, RecordStore, RecordSummary, SearchFilter, SearchHit,
    StoreError,
};
