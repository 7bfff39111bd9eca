//! Peoplepad engine wiring.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use peoplepad_embeddings::{
    CacheStats, EmbeddingCache, EmbeddingClient, EmbeddingError, EmbeddingProvider, HttpProvider,
};
use peoplepad_records::{InMemoryRecordStore, RecordStore, SearchFilter, SearchHit};

use crate::backfill::{Backfill, BackfillReport};
use crate::config::PeoplepadConfig;
use crate::error::{Result, RetrievalError, SearchError};
use crate::jobs::{EmbeddingJobQueue, JobStats};
use crate::search::SimilaritySearchEngine;
use crate::service::RecordService;

/// The semantic search core of Peoplepad.
///
/// Owns one embedding cache, one client, one record store and one job queue,
/// and exposes the record write path and similarity search on top of them.
pub struct Peoplepad {
    /// Configuration.
    config: PeoplepadConfig,

    /// Cached, retrying embedding client.
    client: Arc<EmbeddingClient>,

    /// Record storage.
    store: Arc<dyn RecordStore>,

    /// Background embedding jobs.
    queue: Arc<EmbeddingJobQueue>,

    /// Record write path.
    records: RecordService,

    /// Similarity search.
    search: SimilaritySearchEngine,
}

impl Peoplepad {
    /// Create a new engine builder.
    pub fn builder() -> PeoplepadBuilder {
        PeoplepadBuilder::new()
    }

    /// Configuration the engine was built with.
    pub fn config(&self) -> &PeoplepadConfig {
        &self.config
    }

    /// Record create/update/delete.
    pub fn records(&self) -> &RecordService {
        &self.records
    }

    /// The search engine.
    pub fn search_engine(&self) -> &SimilaritySearchEngine {
        &self.search
    }

    /// Search `owner_id`'s records.
    pub async fn search(
        &self,
        owner_id: Uuid,
        query_text: &str,
        filter: SearchFilter,
    ) -> std::result::Result<Vec<SearchHit>, SearchError> {
        self.search.search(owner_id, query_text, filter).await
    }

    /// The embedding client.
    pub fn client(&self) -> &Arc<EmbeddingClient> {
        &self.client
    }

    /// The record store.
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// The job queue.
    pub fn jobs(&self) -> &Arc<EmbeddingJobQueue> {
        &self.queue
    }

    /// Embed every record that has notes but no vector.
    pub async fn backfill(&self, batch_size: usize) -> Result<BackfillReport> {
        Backfill::new(self.client.clone(), self.store.clone())
            .run(batch_size)
            .await
    }

    /// Get engine statistics.
    pub async fn stats(&self) -> EngineStats {
        EngineStats {
            cache: self.client.cache().stats().await,
            jobs: self.queue.stats(),
            pending_jobs: self.queue.pending(),
        }
    }

    /// Finish queued jobs and stop the job queue.
    pub async fn shutdown(&self) {
        self.queue.shutdown().await;
        info!("Peoplepad engine stopped");
    }
}

/// Builder for [`Peoplepad`].
pub struct PeoplepadBuilder {
    config: PeoplepadConfig,
    provider: Option<Arc<dyn EmbeddingProvider>>,
    store: Option<Arc<dyn RecordStore>>,
    cache: Option<Arc<EmbeddingCache>>,
}

impl PeoplepadBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: PeoplepadConfig::default(),
            provider: None,
            store: None,
            cache: None,
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: PeoplepadConfig) -> Self {
        self.config = config;
        self
    }

    /// Use this provider instead of the HTTP service from the config.
    pub fn with_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Use this store instead of a fresh in-memory one.
    pub fn with_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Share an existing cache.
    pub fn with_cache(mut self, cache: Arc<EmbeddingCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Check the provider's reported dimension during [`build`](Self::build).
    pub fn with_verify_provider(mut self, enabled: bool) -> Self {
        self.config.embedding.verify_provider = enabled;
        self
    }

    /// Build the engine and start its job queue.
    ///
    /// Fails with [`RetrievalError::Config`] when the configured dimension
    /// disagrees with the store's vector column or, if verification is on,
    /// with the provider.
    pub async fn build(self) -> Result<Peoplepad> {
        let config = self.config;
        config.validate()?;
        let embedding = &config.embedding;
        let dimension = embedding.dimension;

        let provider: Arc<dyn EmbeddingProvider> = match self.provider {
            Some(provider) => provider,
            None => {
                let mut http = HttpProvider::new(embedding.service_url.as_str())
                    .with_model(embedding.model.as_str())
                    .with_encoding_format(embedding.encoding_format.as_str())
                    .with_timeouts(embedding.timeout(), embedding.batch_timeout());
                if let Some(key) = &embedding.api_key {
                    http = http.with_api_key(key.as_str());
                }
                Arc::new(http)
            }
        };

        let cache = self.cache.unwrap_or_else(|| {
            Arc::new(match embedding.cache_max_entries {
                Some(max_entries) => EmbeddingCache::with_max_entries(max_entries),
                None => EmbeddingCache::new(),
            })
        });

        let client = Arc::new(
            EmbeddingClient::new(provider, cache, dimension)
                .with_retry_policy(embedding.retry_policy())
                .with_max_batch_size(embedding.max_batch_size),
        );

        let store: Arc<dyn RecordStore> = match self.store {
            Some(store) => store,
            None => Arc::new(InMemoryRecordStore::new(dimension)),
        };
        if store.dimension() != dimension {
            return Err(RetrievalError::Config(format!(
                "embedding dimension {dimension} does not match the store's vector column ({})",
                store.dimension()
            )));
        }

        if embedding.verify_provider {
            client.verify_dimension().await.map_err(|err| match err {
                EmbeddingError::DimensionMismatch { expected, actual } => {
                    RetrievalError::Config(format!(
                        "embedding provider serves {actual}-dimensional vectors, expected {expected}"
                    ))
                }
                other => RetrievalError::Embedding(other),
            })?;
        }

        let queue = Arc::new(EmbeddingJobQueue::start(
            client.clone(),
            store.clone(),
            config.jobs.workers,
        ));
        let records = RecordService::new(store.clone(), queue.clone());
        let search = SimilaritySearchEngine::new(client.clone(), store.clone(), &config.search);

        info!(
            provider = client.provider().name(),
            model = client.provider().model(),
            dimension,
            metric = %config.search.metric,
            "Peoplepad engine initialized"
        );

        Ok(Peoplepad {
            config,
            client,
            store,
            queue,
            records,
            search,
        })
    }
}

impl Default for PeoplepadBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about the engine.
#[derive(Debug, Clone)]
pub struct EngineStats {
    /// Embedding cache statistics.
    pub cache: CacheStats,

    /// Finished job outcomes.
    pub jobs: JobStats,

    /// Jobs accepted but not finished.
    pub pending_jobs: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingConfig;

    #[tokio::test]
    async fn test_builder_defaults() {
        let engine = Peoplepad::builder().build().await.unwrap();
        assert_eq!(engine.store().dimension(), 768);
        assert_eq!(engine.search_engine().limit(), 10);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_store_dimension_mismatch_is_fatal() {
        let result = Peoplepad::builder()
            .with_store(Arc::new(InMemoryRecordStore::new(384)))
            .build()
            .await;
        assert!(matches!(result, Err(RetrievalError::Config(_))));
    }

    #[tokio::test]
    async fn test_invalid_config_is_fatal() {
        let config = PeoplepadConfig::default().with_embedding(EmbeddingConfig {
            dimension: 0,
            ..EmbeddingConfig::default()
        });
        let result = Peoplepad::builder().with_config(config).build().await;
        assert!(matches!(result, Err(RetrievalError::Config(_))));
    }
}
