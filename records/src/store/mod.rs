//! The record store seam.
//!
//! Search and the embedding job talk to storage only through
//! [`RecordStore`]. A relational backend with a vector column implements it
//! the same way [`InMemoryRecordStore`] does.

mod memory;

pub use memory::InMemoryRecordStore;

use async_trait::async_trait;
use peoplepad_embeddings::DistanceMetric;
use uuid::Uuid;

use crate::error::Result;
use crate::filter::{SearchFilter, SearchHit, rank_records};
use crate::record::{PendingEmbedding, Record, RecordDraft};

/// Result of attaching a vector to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The vector was stored.
    Written,

    /// No record has that id (it was deleted meanwhile).
    RecordMissing,
}

/// Persistent storage for records and their embeddings.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Dimension of the vector column.
    fn dimension(&self) -> usize;

    /// Insert a new record for `owner_id`.
    async fn create(&self, owner_id: Uuid, draft: RecordDraft) -> Result<Record>;

    /// Fetch a record, if it exists and belongs to `owner_id`.
    async fn get(&self, owner_id: Uuid, id: Uuid) -> Result<Option<Record>>;

    /// Replace the editable fields of a record.
    ///
    /// The stored embedding is left untouched; a job refreshes it later.
    /// Returns `None` when the record is absent or owned by someone else.
    async fn update(&self, owner_id: Uuid, id: Uuid, draft: RecordDraft)
    -> Result<Option<Record>>;

    /// Delete a record. Returns whether anything was removed.
    async fn delete(&self, owner_id: Uuid, id: Uuid) -> Result<bool>;

    /// All tags `owner_id` has used, sorted.
    async fn list_tags(&self, owner_id: Uuid) -> Result<Vec<String>>;

    /// Current notes of a record.
    ///
    /// `None` when the record does not exist, `Some("")` when it has no notes.
    async fn get_record_text(&self, id: Uuid) -> Result<Option<String>>;

    /// Store the embedding of a record and bump its `updated_at`.
    async fn write_embedding(&self, id: Uuid, embedding: &[f32]) -> Result<WriteOutcome>;

    /// Records matching `filter`, with or without an embedding.
    async fn query_by_filter(&self, filter: &SearchFilter) -> Result<Vec<Record>>;

    /// The `limit` matching records closest to `query`.
    ///
    /// Must agree with [`rank_records`] over [`RecordStore::query_by_filter`],
    /// which is what the default does.
    async fn nearest(
        &self,
        filter: &SearchFilter,
        query: &[f32],
        metric: DistanceMetric,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let candidates = self.query_by_filter(filter).await?;
        rank_records(query, candidates, metric, limit)
    }

    /// Up to `limit` records with non-blank notes and no embedding, in id
    /// order, starting after the id `after`.
    async fn records_missing_embedding(
        &self,
        after: Option<Uuid>,
        limit: usize,
    ) -> Result<Vec<PendingEmbedding>>;
}
