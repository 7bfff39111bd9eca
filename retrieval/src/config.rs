//! Configuration for the Peoplepad retrieval engine.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use peoplepad_embeddings::{DEFAULT_DIMENSION, DistanceMetric, MAX_BATCH_SIZE, RetryPolicy};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, RetrievalError};

/// Environment variable holding the embedding service key.
pub const API_KEY_ENV: &str = "EMBEDDING_SERVICE_KEY";

/// Top-level configuration, usually read from a TOML file.
///
/// ```toml
/// [embedding]
/// service_url = "http://embedding-service:8080"
/// dimension = 768
///
/// [search]
/// limit = 10
/// metric = "cosine"
///
/// [jobs]
/// workers = 4
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeoplepadConfig {
    /// Embedding service configuration.
    pub embedding: EmbeddingConfig,

    /// Search configuration.
    pub search: SearchConfig,

    /// Background job configuration.
    pub jobs: JobConfig,
}

impl PeoplepadConfig {
    /// Read a TOML config file and apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&raw)?.with_env_overrides();
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Parse and validate a TOML document. The environment is not consulted.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Take the API key from the process environment when it is set there.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup`, which maps variable names to values.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.embedding.api_key = Some(key);
        }
        self
    }

    /// Set the embedding configuration.
    pub fn with_embedding(mut self, config: EmbeddingConfig) -> Self {
        self.embedding = config;
        self
    }

    /// Set the search configuration.
    pub fn with_search(mut self, config: SearchConfig) -> Self {
        self.search = config;
        self
    }

    /// Set the job configuration.
    pub fn with_jobs(mut self, config: JobConfig) -> Self {
        self.jobs = config;
        self
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let embedding = &self.embedding;
        if embedding.dimension == 0 {
            return Err(RetrievalError::Config(
                "embedding.dimension must be positive".to_string(),
            ));
        }
        if embedding.max_batch_size == 0 || embedding.max_batch_size > MAX_BATCH_SIZE {
            return Err(RetrievalError::Config(format!(
                "embedding.max_batch_size must be between 1 and {MAX_BATCH_SIZE}"
            )));
        }
        if embedding.max_retries == 0 {
            return Err(RetrievalError::Config(
                "embedding.max_retries must be at least 1".to_string(),
            ));
        }
        if self.search.limit == 0 {
            return Err(RetrievalError::Config(
                "search.limit must be positive".to_string(),
            ));
        }
        if self.jobs.workers == 0 {
            return Err(RetrievalError::Config(
                "jobs.workers must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the embedding service and client.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Base URL of the embedding service.
    pub service_url: String,

    /// Bearer key for the service. Prefer the environment over the file.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Model requested from the service.
    pub model: String,

    /// Encoding format requested from the service.
    pub encoding_format: String,

    /// Vector dimension shared by the service and the store.
    pub dimension: usize,

    /// Timeout for single-text requests (in seconds).
    pub timeout_secs: u64,

    /// Timeout for batch requests (in seconds).
    pub batch_timeout_secs: u64,

    /// Total attempts per provider call, including the first.
    pub max_retries: u32,

    /// Delay before the first retry (in milliseconds).
    pub retry_base_delay_ms: u64,

    /// Upper bound on any retry delay (in milliseconds).
    pub retry_max_delay_ms: u64,

    /// Largest accepted batch.
    pub max_batch_size: usize,

    /// Cache bound. Unbounded when absent.
    pub cache_max_entries: Option<usize>,

    /// Check the service's reported dimension at startup.
    pub verify_provider: bool,
}

impl EmbeddingConfig {
    /// Retry policy described by this configuration.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.retry_base_delay_ms),
            Duration::from_millis(self.retry_max_delay_ms),
        )
    }

    /// Single-request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Batch-request timeout.
    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            service_url: "http://embedding-service:8080".to_string(),
            api_key: None,
            model: "all-mpnet-base-v2".to_string(),
            encoding_format: "float".to_string(),
            dimension: DEFAULT_DIMENSION,
            timeout_secs: 10,
            batch_timeout_secs: 30,
            max_retries: 3,
            retry_base_delay_ms: 1000,
            retry_max_delay_ms: 10_000,
            max_batch_size: MAX_BATCH_SIZE,
            cache_max_entries: None,
            verify_provider: false,
        }
    }
}

impl fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("service_url", &self.service_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("encoding_format", &self.encoding_format)
            .field("dimension", &self.dimension)
            .field("timeout_secs", &self.timeout_secs)
            .field("batch_timeout_secs", &self.batch_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .field("retry_max_delay_ms", &self.retry_max_delay_ms)
            .field("max_batch_size", &self.max_batch_size)
            .field("cache_max_entries", &self.cache_max_entries)
            .field("verify_provider", &self.verify_provider)
            .finish()
    }
}

/// Configuration for similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Maximum number of results per search.
    pub limit: usize,

    /// Distance used for ranking.
    pub metric: DistanceMetric,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: 10,
            metric: DistanceMetric::Cosine,
        }
    }
}

/// Configuration for the embedding job queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Jobs allowed to run at once.
    pub workers: usize,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}
