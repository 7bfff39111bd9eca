//! The default `nearest` must rank exactly like a store's native ranking.

use async_trait::async_trait;
use peoplepad_embeddings::DistanceMetric;
use peoplepad_records::{
    InMemoryRecordStore, PendingEmbedding, Record, RecordDraft, RecordStore, Result, SearchFilter,
    WriteOutcome,
};
use pretty_assertions::assert_eq;
use uuid::Uuid;

/// Delegates everything but `nearest`, which falls back to the trait default.
struct FilterOnly(InMemoryRecordStore);

#[async_trait]
impl RecordStore for FilterOnly {
    fn dimension(&self) -> usize {
        self.0.dimension()
    }

    async fn create(&self, owner_id: Uuid, draft: RecordDraft) -> Result<Record> {
        self.0.create(owner_id, draft).await
    }

    async fn get(&self, owner_id: Uuid, id: Uuid) -> Result<Option<Record>> {
        self.0.get(owner_id, id).await
    }

    async fn update(
        &self,
        owner_id: Uuid,
        id: Uuid,
        draft: RecordDraft,
    ) -> Result<Option<Record>> {
        self.0.update(owner_id, id, draft).await
    }

    async fn delete(&self, owner_id: Uuid, id: Uuid) -> Result<bool> {
        self.0.delete(owner_id, id).await
    }

    async fn list_tags(&self, owner_id: Uuid) -> Result<Vec<String>> {
        self.0.list_tags(owner_id).await
    }

    async fn get_record_text(&self, id: Uuid) -> Result<Option<String>> {
        self.0.get_record_text(id).await
    }

    async fn write_embedding(&self, id: Uuid, embedding: &[f32]) -> Result<WriteOutcome> {
        self.0.write_embedding(id, embedding).await
    }

    async fn query_by_filter(&self, filter: &SearchFilter) -> Result<Vec<Record>> {
        self.0.query_by_filter(filter).await
    }

    async fn records_missing_embedding(
        &self,
        after: Option<Uuid>,
        limit: usize,
    ) -> Result<Vec<PendingEmbedding>> {
        self.0.records_missing_embedding(after, limit).await
    }
}

#[tokio::test]
async fn test_default_nearest_matches_native() {
    let store = FilterOnly(InMemoryRecordStore::new(2));
    let owner = Uuid::new_v4();

    let vectors = [[1.0, 0.0], [0.0, 1.0], [0.7, 0.7], [1.0, 0.0], [0.2, 0.9]];
    let tags = [["ai"], ["sales"], ["ai"], ["conference"], ["AI"]];
    for (i, (vector, tag)) in vectors.iter().zip(tags).enumerate() {
        let record = store
            .create(
                owner,
                RecordDraft::new(format!("r{i}"))
                    .with_notes("notes")
                    .with_tags(tag),
            )
            .await
            .unwrap();
        store.write_embedding(record.id, vector).await.unwrap();
    }

    let filters = [
        SearchFilter::for_owner(owner),
        SearchFilter::for_owner(owner).with_tag_prefixes(["a"]),
        SearchFilter::for_owner(Uuid::new_v4()),
    ];
    for filter in &filters {
        for metric in [DistanceMetric::Cosine, DistanceMetric::L2] {
            let query = [0.9, 0.1];
            let fallback = store.nearest(filter, &query, metric, 3).await.unwrap();
            let native = store.0.nearest(filter, &query, metric, 3).await.unwrap();
            assert_eq!(fallback, native);
        }
    }
}
