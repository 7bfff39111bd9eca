//! Shared fixtures for the engine tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use peoplepad_embeddings::{
    BatchInput, BatchOutput, Embedding, EmbeddingError, EmbeddingProvider, ProviderMetadata,
    Result,
};
use peoplepad_records::InMemoryRecordStore;
use peoplepad_retrieval::{EmbeddingConfig, Peoplepad, PeoplepadConfig};

/// Words the keyword model knows about, one dimension each.
pub const VOCABULARY: [&str; 8] = [
    "ai",
    "conference",
    "sales",
    "startup",
    "investor",
    "music",
    "hiking",
    "python",
];

/// Vocabulary dimensions plus a constant bias dimension.
pub const DIMENSION: usize = VOCABULARY.len() + 1;

/// Deterministic embedding: keyword counts plus a small bias so that no
/// vector is zero.
pub fn keyword_embedding(text: &str) -> Embedding {
    let mut embedding = vec![0.0; DIMENSION];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
    {
        if let Some(position) = VOCABULARY.iter().position(|v| *v == word) {
            embedding[position] += 1.0;
        }
    }
    embedding[DIMENSION - 1] = 0.1;
    embedding
}

/// In-process provider with call counters and a failure switch.
#[derive(Default)]
pub struct KeywordProvider {
    pub single_calls: AtomicUsize,
    pub batch_calls: AtomicUsize,
    pub fail: AtomicBool,
}

impl KeywordProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.single_calls.load(Ordering::SeqCst) + self.batch_calls.load(Ordering::SeqCst)
    }

    fn check(&self, text: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(EmbeddingError::Connection("connection refused".into()));
        }
        if text.contains("poison") {
            return Err(EmbeddingError::Client {
                status: 400,
                body: "Unsupported input".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordProvider {
    fn name(&self) -> &str {
        "keyword"
    }

    fn model(&self) -> &str {
        "keyword-v1"
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        self.check(text)?;
        Ok(keyword_embedding(text))
    }

    async fn embed_batch(&self, inputs: &[BatchInput]) -> Result<Vec<BatchOutput>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        for input in inputs {
            self.check(&input.text)?;
        }
        // Reversed on purpose; the client correlates by id.
        Ok(inputs
            .iter()
            .rev()
            .map(|input| BatchOutput {
                id: input.id.clone(),
                embedding: keyword_embedding(&input.text),
            })
            .collect())
    }

    async fn metadata(&self) -> Result<ProviderMetadata> {
        Ok(ProviderMetadata {
            model: "keyword-v1".into(),
            dimension: DIMENSION,
            version: None,
        })
    }
}

/// Config sized for the keyword model, with a single fast attempt.
pub fn test_config() -> PeoplepadConfig {
    PeoplepadConfig::default().with_embedding(EmbeddingConfig {
        dimension: DIMENSION,
        max_retries: 1,
        retry_base_delay_ms: 1,
        retry_max_delay_ms: 5,
        ..EmbeddingConfig::default()
    })
}

pub struct Harness {
    pub engine: Peoplepad,
    pub provider: Arc<KeywordProvider>,
    pub store: Arc<InMemoryRecordStore>,
}

pub async fn harness() -> Harness {
    let provider = KeywordProvider::new();
    let store = Arc::new(InMemoryRecordStore::new(DIMENSION));
    let engine = Peoplepad::builder()
        .with_config(test_config())
        .with_provider(provider.clone())
        .with_store(store.clone())
        .with_verify_provider(true)
        .build()
        .await
        .unwrap();

    Harness {
        engine,
        provider,
        store,
    }
}
