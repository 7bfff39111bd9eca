//! In-process record store.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use peoplepad_embeddings::DistanceMetric;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{RecordStore, WriteOutcome};
use crate::error::{Result, StoreError};
use crate::filter::{SearchFilter, SearchHit};
use crate::record::{PendingEmbedding, Record, RecordDraft};
use crate::vector::VectorColumn;

#[derive(Debug)]
struct Inner {
    /// Records by id. Their `embedding` field is always `None`; vectors
    /// live in `column`.
    records: HashMap<Uuid, Record>,

    column: VectorColumn,
}

impl Inner {
    fn hydrate(&self, record: &Record) -> Record {
        let mut record = record.clone();
        record.embedding = self.column.get(&record.id).cloned();
        record
    }

    fn owned(&self, owner_id: Uuid, id: Uuid) -> Option<&Record> {
        self.records.get(&id).filter(|r| r.owner_id == owner_id)
    }
}

/// A [`RecordStore`] held entirely in memory.
///
/// Used by tests and by single-process deployments. Ranking runs natively
/// on the vector column.
#[derive(Debug)]
pub struct InMemoryRecordStore {
    inner: RwLock<Inner>,
    dimension: usize,
    available: AtomicBool,
}

impl InMemoryRecordStore {
    /// Create an empty store whose vector column holds `dimension` floats.
    pub fn new(dimension: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                records: HashMap::new(),
                column: VectorColumn::new(dimension),
            }),
            dimension,
            available: AtomicBool::new(true),
        }
    }

    /// Simulate losing (or regaining) the backing database. While
    /// unavailable every call fails with [`StoreError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Insert a fully formed record as is, keeping its id, timestamps and
    /// embedding.
    pub async fn import(&self, mut record: Record) -> Result<()> {
        self.check_available()?;
        let mut inner = self.inner.write().await;
        if let Some(embedding) = record.embedding.take() {
            inner.column.set(record.id, &embedding)?;
        }
        inner.records.insert(record.id, record);
        Ok(())
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    /// Whether the store holds no records.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.records.is_empty()
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn create(&self, owner_id: Uuid, draft: RecordDraft) -> Result<Record> {
        self.check_available()?;
        let record = Record::new(owner_id, draft.validate()?);
        self.inner
            .write()
            .await
            .records
            .insert(record.id, record.clone());
        debug!(record_id = %record.id, "created record");
        Ok(record)
    }

    async fn get(&self, owner_id: Uuid, id: Uuid) -> Result<Option<Record>> {
        self.check_available()?;
        let inner = self.inner.read().await;
        Ok(inner.owned(owner_id, id).map(|r| inner.hydrate(r)))
    }

    async fn update(
        &self,
        owner_id: Uuid,
        id: Uuid,
        draft: RecordDraft,
    ) -> Result<Option<Record>> {
        self.check_available()?;
        let draft = draft.validate()?;
        let mut inner = self.inner.write().await;
        let Some(record) = inner
            .records
            .get_mut(&id)
            .filter(|r| r.owner_id == owner_id)
        else {
            return Ok(None);
        };

        record.name = draft.name;
        record.notes = draft.notes;
        record.tags = draft.tags;
        record.updated_at = Utc::now();
        let record = record.clone();

        debug!(record_id = %id, "updated record");
        Ok(Some(inner.hydrate(&record)))
    }

    async fn delete(&self, owner_id: Uuid, id: Uuid) -> Result<bool> {
        self.check_available()?;
        let mut inner = self.inner.write().await;
        if inner.owned(owner_id, id).is_none() {
            return Ok(false);
        }
        inner.records.remove(&id);
        inner.column.remove(&id);
        debug!(record_id = %id, "deleted record");
        Ok(true)
    }

    async fn list_tags(&self, owner_id: Uuid) -> Result<Vec<String>> {
        self.check_available()?;
        let inner = self.inner.read().await;
        let tags: BTreeSet<&String> = inner
            .records
            .values()
            .filter(|r| r.owner_id == owner_id)
            .flat_map(|r| r.tags.iter())
            .collect();
        Ok(tags.into_iter().cloned().collect())
    }

    async fn get_record_text(&self, id: Uuid) -> Result<Option<String>> {
        self.check_available()?;
        let inner = self.inner.read().await;
        Ok(inner
            .records
            .get(&id)
            .map(|r| r.notes.clone().unwrap_or_default()))
    }

    async fn write_embedding(&self, id: Uuid, embedding: &[f32]) -> Result<WriteOutcome> {
        self.check_available()?;
        let mut inner = self.inner.write().await;
        if !inner.records.contains_key(&id) {
            return Ok(WriteOutcome::RecordMissing);
        }

        inner.column.set(id, embedding)?;
        if let Some(record) = inner.records.get_mut(&id) {
            record.updated_at = Utc::now();
        }
        Ok(WriteOutcome::Written)
    }

    async fn query_by_filter(&self, filter: &SearchFilter) -> Result<Vec<Record>> {
        self.check_available()?;
        let inner = self.inner.read().await;
        let mut records: Vec<Record> = inner
            .records
            .values()
            .filter(|r| filter.matches(r))
            .map(|r| inner.hydrate(r))
            .collect();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    async fn nearest(
        &self,
        filter: &SearchFilter,
        query: &[f32],
        metric: DistanceMetric,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        self.check_available()?;
        let inner = self.inner.read().await;
        let candidates = inner
            .records
            .values()
            .filter(|r| filter.matches(r))
            .map(|r| r.id);

        let ranked = inner.column.nearest(query, candidates, metric, limit)?;
        Ok(ranked
            .into_iter()
            .filter_map(|(id, distance)| {
                inner.records.get(&id).map(|record| SearchHit {
                    record: record.summary(),
                    distance,
                })
            })
            .collect())
    }

    async fn records_missing_embedding(
        &self,
        after: Option<Uuid>,
        limit: usize,
    ) -> Result<Vec<PendingEmbedding>> {
        self.check_available()?;
        let inner = self.inner.read().await;
        let mut pending: Vec<PendingEmbedding> = inner
            .records
            .values()
            .filter(|r| after.is_none_or(|after| r.id > after))
            .filter(|r| !inner.column.contains(&r.id))
            .filter_map(|r| {
                r.embeddable_text().map(|text| PendingEmbedding {
                    id: r.id,
                    text: text.to_string(),
                })
            })
            .collect();
        pending.sort_by_key(|p| p.id);
        pending.truncate(limit);
        Ok(pending)
    }
}
