//! Cached, retrying front end to an [`EmbeddingProvider`].

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::Embedding;
use crate::cache::EmbeddingCache;
use crate::error::{EmbeddingError, Result};
use crate::provider::{BatchInput, EmbeddingProvider, ProviderMetadata};
use crate::retry::RetryPolicy;

/// Maximum number of texts accepted by one batch call.
pub const MAX_BATCH_SIZE: usize = 100;

/// Length of the text prefix included in log lines.
const PREVIEW_CHARS: usize = 50;

/// First few characters of `text`, for log lines.
pub fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Turns text into embeddings, consulting the cache before the provider.
///
/// Every provider call goes through the [`RetryPolicy`], and every vector
/// that comes back is checked against the configured dimension before it is
/// cached or returned.
pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
    cache: Arc<EmbeddingCache>,
    retry: RetryPolicy,
    dimension: usize,
    max_batch_size: usize,
}

impl EmbeddingClient {
    /// Create a client producing `dimension`-long vectors.
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        cache: Arc<EmbeddingCache>,
        dimension: usize,
    ) -> Self {
        Self {
            provider,
            cache,
            retry: RetryPolicy::default(),
            dimension,
            max_batch_size: MAX_BATCH_SIZE,
        }
    }

    /// Set the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the batch cap.
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size.max(1);
        self
    }

    /// Configured vector dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Largest batch accepted by [`embed_batch`](Self::embed_batch).
    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// The shared cache.
    pub fn cache(&self) -> &Arc<EmbeddingCache> {
        &self.cache
    }

    /// The underlying provider.
    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        Ok(())
    }

    /// Embed one text.
    pub async fn embed_one(&self, text: &str) -> Result<Embedding> {
        if let Some(embedding) = self.cache.get(text).await {
            debug!("Cache hit for embedding");
            return Ok(embedding);
        }

        let embedding = self
            .retry
            .run("embed_one", || self.provider.embed(text))
            .await?;
        self.check_dimension(&embedding)?;
        self.cache.set(text, &embedding).await;

        info!(text = %preview(text), "Generated and cached embedding");
        Ok(embedding)
    }

    /// Embed up to [`max_batch_size`](Self::max_batch_size) texts.
    ///
    /// Output position `i` holds the embedding of `texts[i]`. Larger inputs
    /// are rejected; chunking is the caller's job.
    pub async fn embed_batch<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<Embedding>> {
        if texts.len() > self.max_batch_size {
            return Err(EmbeddingError::BatchTooLarge {
                size: texts.len(),
                max: self.max_batch_size,
            });
        }
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut slots: Vec<Option<Embedding>> = Vec::with_capacity(texts.len());
        let mut misses: Vec<BatchInput> = Vec::new();
        let mut miss_slots: Vec<usize> = Vec::new();

        for (position, text) in texts.iter().enumerate() {
            let text = text.as_ref();
            let cached = self.cache.get(text).await;
            if cached.is_none() {
                misses.push(BatchInput::new(position.to_string(), text));
                miss_slots.push(position);
            }
            slots.push(cached);
        }

        debug!(
            items = texts.len(),
            cache_misses = misses.len(),
            "embedding batch"
        );

        if !misses.is_empty() {
            let outputs = self
                .retry
                .run("embed_batch", || self.provider.embed_batch(&misses))
                .await?;

            // Correlate by id; providers may return items in any order.
            let mut by_id: HashMap<String, Embedding> = outputs
                .into_iter()
                .map(|output| (output.id, output.embedding))
                .collect();

            for (input, slot) in misses.iter().zip(miss_slots) {
                let embedding = by_id.remove(&input.id).ok_or_else(|| {
                    EmbeddingError::InvalidResponse(format!(
                        "no embedding returned for batch item {}",
                        input.id
                    ))
                })?;
                self.check_dimension(&embedding)?;
                self.cache.set(&input.text, &embedding).await;
                slots[slot] = Some(embedding);
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(position, slot)| {
                slot.ok_or_else(|| {
                    EmbeddingError::InvalidResponse(format!(
                        "no embedding for batch position {position}"
                    ))
                })
            })
            .collect()
    }

    /// Confirm the provider serves vectors of the configured dimension.
    pub async fn verify_dimension(&self) -> Result<ProviderMetadata> {
        let metadata = self
            .retry
            .run("metadata", || self.provider.metadata())
            .await?;

        if metadata.dimension != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: metadata.dimension,
            });
        }

        info!(
            model = %metadata.model,
            dimension = metadata.dimension,
            "Embedding provider dimension verified"
        );
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::BatchOutput;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Deterministic provider that counts calls and can fail on demand.
    struct ScriptedProvider {
        dimension: usize,
        calls: AtomicUsize,
        batch_calls: AtomicUsize,
        /// Number of leading calls that fail transiently.
        transient_failures: usize,
        permanent_failure: bool,
        reverse_batches: bool,
        drop_last_batch_item: bool,
    }

    impl ScriptedProvider {
        fn new(dimension: usize) -> Self {
            Self {
                dimension,
                calls: AtomicUsize::new(0),
                batch_calls: AtomicUsize::new(0),
                transient_failures: 0,
                permanent_failure: false,
                reverse_batches: false,
                drop_last_batch_item: false,
            }
        }

        fn vector_for(&self, text: &str) -> Embedding {
            let seed = text.bytes().map(f32::from).sum::<f32>();
            (0..self.dimension).map(|i| seed + i as f32).collect()
        }

        fn attempt(&self) -> Result<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.permanent_failure {
                return Err(EmbeddingError::Client {
                    status: 401,
                    body: "Invalid API key".into(),
                });
            }
            if n < self.transient_failures {
                return Err(EmbeddingError::Server {
                    status: 503,
                    body: String::new(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl EmbeddingProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "scripted-model"
        }

        async fn embed(&self, text: &str) -> Result<Embedding> {
            self.attempt()?;
            Ok(self.vector_for(text))
        }

        async fn embed_batch(&self, inputs: &[BatchInput]) -> Result<Vec<BatchOutput>> {
            self.attempt()?;
            self.batch_calls.fetch_add(1, Ordering::SeqCst);
            let mut outputs: Vec<BatchOutput> = inputs
                .iter()
                .map(|input| BatchOutput {
                    id: input.id.clone(),
                    embedding: self.vector_for(&input.text),
                })
                .collect();
            if self.reverse_batches {
                outputs.reverse();
            }
            if self.drop_last_batch_item {
                outputs.pop();
            }
            Ok(outputs)
        }

        async fn metadata(&self) -> Result<ProviderMetadata> {
            Ok(ProviderMetadata {
                model: "scripted-model".into(),
                dimension: self.dimension,
                version: None,
            })
        }
    }

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1), Duration::from_millis(2))
    }

    fn client(provider: Arc<ScriptedProvider>, dimension: usize) -> EmbeddingClient {
        EmbeddingClient::new(provider, Arc::new(EmbeddingCache::new()), dimension)
            .with_retry_policy(fast_retry(3))
    }

    #[tokio::test]
    async fn test_repeated_text_hits_provider_once() {
        let provider = Arc::new(ScriptedProvider::new(4));
        let client = client(provider.clone(), 4);

        let first = client.embed_one("Met at conference").await.unwrap();
        let second = client.embed_one("Met at conference").await.unwrap();
        let third = client.embed_one("Met at conference").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(second, third);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.cache().stats().await.hits, 2);
    }

    #[tokio::test]
    async fn test_batch_preserves_input_order() {
        let mut provider = ScriptedProvider::new(2);
        provider.reverse_batches = true;
        let provider = Arc::new(provider);
        let client = client(provider.clone(), 2);

        let texts = ["one", "two", "three"];
        let embeddings = client.embed_batch(&texts).await.unwrap();

        assert_eq!(embeddings.len(), 3);
        for (text, embedding) in texts.iter().zip(&embeddings) {
            assert_eq!(embedding, &provider.vector_for(text));
        }
    }

    #[tokio::test]
    async fn test_batch_only_requests_cache_misses() {
        let provider = Arc::new(ScriptedProvider::new(2));
        let client = client(provider.clone(), 2);

        client.embed_one("two").await.unwrap();
        let embeddings = client.embed_batch(&["one", "two", "three"]).await.unwrap();

        assert_eq!(embeddings[1], provider.vector_for("two"));
        assert_eq!(provider.batch_calls.load(Ordering::SeqCst), 1);
        assert!(client.cache().contains("three").await);

        // Everything is cached now: no provider call at all.
        client.embed_batch(&["three", "one"]).await.unwrap();
        assert_eq!(provider.batch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_batch_over_cap_is_rejected_without_calls() {
        let provider = Arc::new(ScriptedProvider::new(2));
        let client = client(provider.clone(), 2).with_max_batch_size(3);

        let err = client
            .embed_batch(&["a", "b", "c", "d"])
            .await
            .unwrap_err();

        assert!(matches!(err, EmbeddingError::BatchTooLarge { size: 4, max: 3 }));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let provider = Arc::new(ScriptedProvider::new(2));
        let client = client(provider.clone(), 2);

        let embeddings = client.embed_batch::<&str>(&[]).await.unwrap();
        assert!(embeddings.is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_batch_item_is_invalid_response() {
        let mut provider = ScriptedProvider::new(2);
        provider.drop_last_batch_item = true;
        let client = client(Arc::new(provider), 2);

        let err = client.embed_batch(&["a", "b"]).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let mut provider = ScriptedProvider::new(2);
        provider.transient_failures = 2;
        let provider = Arc::new(provider);
        let client = client(provider.clone(), 2);

        let embedding = client.embed_one("retry me").await.unwrap();

        assert_eq!(embedding, provider.vector_for("retry me"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let mut provider = ScriptedProvider::new(2);
        provider.transient_failures = 10;
        let provider = Arc::new(provider);
        let client = client(provider.clone(), 2);

        let err = client.embed_one("never").await.unwrap_err();

        assert!(matches!(err, EmbeddingError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        assert!(!client.cache().contains("never").await);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let mut provider = ScriptedProvider::new(2);
        provider.permanent_failure = true;
        let provider = Arc::new(provider);
        let client = client(provider.clone(), 2);

        let err = client.embed_one("denied").await.unwrap_err();

        assert!(matches!(err, EmbeddingError::Client { status: 401, .. }));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_wrong_dimension_is_rejected_and_not_cached() {
        let provider = Arc::new(ScriptedProvider::new(3));
        let client = client(provider, 768);

        let err = client.embed_one("short vector").await.unwrap_err();

        assert!(matches!(
            err,
            EmbeddingError::DimensionMismatch {
                expected: 768,
                actual: 3
            }
        ));
        assert!(client.cache().is_empty().await);
        assert!(client.verify_dimension().await.is_err());
    }

    #[tokio::test]
    async fn test_verify_dimension() {
        let client = client(Arc::new(ScriptedProvider::new(4)), 4);
        let metadata = client.verify_dimension().await.unwrap();
        assert_eq!(metadata.dimension, 4);
    }

    #[tokio::test]
    async fn test_shared_cache_across_clients() {
        let cache = Arc::new(EmbeddingCache::new());
        let first = Arc::new(ScriptedProvider::new(2));
        let second = Arc::new(ScriptedProvider::new(2));
        let a = EmbeddingClient::new(first.clone(), cache.clone(), 2);
        let b = EmbeddingClient::new(second.clone(), cache, 2);

        a.embed_one("shared").await.unwrap();
        b.embed_one("shared").await.unwrap();

        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_preview_truncates() {
        assert_eq!(preview("short"), "short");
        let long = "x".repeat(80);
        assert_eq!(preview(&long), format!("{}...", "x".repeat(50)));
    }
}
