//! Semantic search over a user's records.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use peoplepad_embeddings::{DistanceMetric, EmbeddingClient, preview};
use peoplepad_records::{RecordStore, SearchFilter, SearchHit};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::SearchConfig;
use crate::error::SearchError;

/// A search as submitted by a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,

    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,

    /// Tag prefixes; a record matches if any of its tags starts with any of
    /// them.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SearchRequest {
    /// The filter this request describes, scoped to `owner_id`.
    pub fn filter_for(&self, owner_id: Uuid) -> SearchFilter {
        SearchFilter {
            owner_id,
            start: self.start_date,
            end: self.end_date,
            tag_prefixes: Vec::new(),
        }
        .with_tag_prefixes(&self.tags)
    }
}

/// Ranks a user's records by similarity of their notes to a query.
pub struct SimilaritySearchEngine {
    client: Arc<EmbeddingClient>,
    store: Arc<dyn RecordStore>,
    metric: DistanceMetric,
    limit: usize,
}

impl SimilaritySearchEngine {
    /// Create an engine.
    pub fn new(
        client: Arc<EmbeddingClient>,
        store: Arc<dyn RecordStore>,
        config: &SearchConfig,
    ) -> Self {
        Self {
            client,
            store,
            metric: config.metric,
            limit: config.limit,
        }
    }

    /// Metric used for ranking.
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Results returned by [`search`](Self::search).
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// The closest records of `owner_id` to `query_text`, up to the
    /// configured limit.
    ///
    /// `filter.owner_id` is replaced by `owner_id`.
    pub async fn search(
        &self,
        owner_id: Uuid,
        query_text: &str,
        filter: SearchFilter,
    ) -> Result<Vec<SearchHit>, SearchError> {
        self.search_with_limit(owner_id, query_text, filter, self.limit)
            .await
    }

    /// Run a client request for `owner_id`.
    pub async fn search_request(
        &self,
        owner_id: Uuid,
        request: &SearchRequest,
    ) -> Result<Vec<SearchHit>, SearchError> {
        self.search(owner_id, &request.query, request.filter_for(owner_id))
            .await
    }

    /// Like [`search`](Self::search) with an explicit limit.
    pub async fn search_with_limit(
        &self,
        owner_id: Uuid,
        query_text: &str,
        mut filter: SearchFilter,
        limit: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        if query_text.trim().is_empty() {
            return Err(SearchError::InvalidQuery(
                "query text must not be empty".to_string(),
            ));
        }
        filter.owner_id = owner_id;

        let query = self.client.embed_one(query_text).await.map_err(|err| {
            warn!(
                query = %preview(query_text),
                kind = err.kind(),
                error = %err,
                "Failed to embed search query"
            );
            SearchError::from(err)
        })?;

        let hits = self
            .store
            .nearest(&filter, &query, self.metric, limit)
            .await
            .map_err(|err| {
                warn!(kind = err.kind(), error = %err, "Search query failed");
                SearchError::from(err)
            })?;

        debug!(
            query = %preview(query_text),
            results = hits.len(),
            metric = %self.metric,
            "Search completed"
        );
        Ok(hits)
    }
}
