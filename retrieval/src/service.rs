//! Record write path.

use std::sync::Arc;

use peoplepad_records::{Record, RecordDraft, RecordStore, Result};
use tracing::debug;
use uuid::Uuid;

use crate::jobs::{EmbeddingJobQueue, EmbeddingUpdateJob};

/// Record CRUD that keeps embeddings up to date in the background.
///
/// Creates and updates return as soon as the store has committed; the
/// embedding of the new notes arrives later through the job queue.
#[derive(Clone)]
pub struct RecordService {
    store: Arc<dyn RecordStore>,
    queue: Arc<EmbeddingJobQueue>,
}

impl RecordService {
    pub fn new(store: Arc<dyn RecordStore>, queue: Arc<EmbeddingJobQueue>) -> Self {
        Self { store, queue }
    }

    /// Create a record and schedule its embedding.
    pub async fn create(&self, owner_id: Uuid, draft: RecordDraft) -> Result<Record> {
        let record = self.store.create(owner_id, draft).await?;
        self.queue.enqueue(EmbeddingUpdateJob::for_record(&record));
        debug!(record_id = %record.id, "Scheduled embedding for new record");
        Ok(record)
    }

    /// Update a record and schedule a fresh embedding. `None` when the
    /// record does not exist for `owner_id`.
    pub async fn update(
        &self,
        owner_id: Uuid,
        id: Uuid,
        draft: RecordDraft,
    ) -> Result<Option<Record>> {
        let Some(record) = self.store.update(owner_id, id, draft).await? else {
            return Ok(None);
        };
        self.queue.enqueue(EmbeddingUpdateJob::for_record(&record));
        debug!(record_id = %record.id, "Scheduled embedding for updated record");
        Ok(Some(record))
    }

    /// Delete a record.
    pub async fn delete(&self, owner_id: Uuid, id: Uuid) -> Result<bool> {
        self.store.delete(owner_id, id).await
    }

    /// Fetch a record.
    pub async fn get(&self, owner_id: Uuid, id: Uuid) -> Result<Option<Record>> {
        self.store.get(owner_id, id).await
    }

    /// Tags used by `owner_id`.
    pub async fn list_tags(&self, owner_id: Uuid) -> Result<Vec<String>> {
        self.store.list_tags(owner_id).await
    }
}
