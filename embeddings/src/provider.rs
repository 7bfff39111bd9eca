//! Embedding providers.
//!
//! A provider performs exactly one attempt per call and reports failures as
//! transient or permanent [`EmbeddingError`]s. Caching and retry live in
//! [`EmbeddingClient`](crate::EmbeddingClient).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};

/// Default timeout for a single-text request.
pub const DEFAULT_SINGLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for a batch request.
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(30);

/// One item of a batch request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchInput {
    /// Caller-chosen identifier echoed back in the response.
    pub id: String,

    /// Text to embed.
    pub text: String,
}

impl BatchInput {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// One item of a batch response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutput {
    /// Identifier from the matching [`BatchInput`].
    pub id: String,

    /// The generated embedding.
    pub embedding: Embedding,
}

/// What the provider reports about its model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    /// Model served.
    pub model: String,

    /// Output dimensionality.
    pub dimension: usize,

    /// Provider software version, if reported.
    #[serde(default)]
    pub version: Option<String>,
}

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Get the name of this provider.
    fn name(&self) -> &str;

    /// The model requested from the provider.
    fn model(&self) -> &str;

    /// Generate an embedding for the given text.
    async fn embed(&self, text: &str) -> Result<Embedding>;

    /// Generate embeddings for multiple texts, correlated by id.
    async fn embed_batch(&self, inputs: &[BatchInput]) -> Result<Vec<BatchOutput>> {
        // Default implementation: process sequentially
        let mut outputs = Vec::with_capacity(inputs.len());
        for input in inputs {
            outputs.push(BatchOutput {
                id: input.id.clone(),
                embedding: self.embed(&input.text).await?,
            });
        }
        Ok(outputs)
    }

    /// Describe the served model, used for the startup dimension check.
    async fn metadata(&self) -> Result<ProviderMetadata>;

    /// Whether the provider reports itself ready.
    async fn health(&self) -> Result<bool> {
        Ok(true)
    }
}

/// Provider speaking the embedding service's HTTP contract.
///
/// | Call | Route |
/// |------|-------|
/// | single | `POST {base_url}/embed` |
/// | batch | `POST {base_url}/embed/batch` |
/// | metadata | `GET {base_url}/metadata` |
/// | health | `GET {base_url}/health` |
pub struct HttpProvider {
    /// Service root, without trailing slash.
    base_url: String,

    /// Bearer credential.
    api_key: Option<String>,

    /// Model name sent with every request.
    model: String,

    /// Requested vector encoding.
    encoding_format: String,

    single_timeout: Duration,
    batch_timeout: Duration,

    /// HTTP client.
    client: reqwest::Client,
}

impl HttpProvider {
    /// Create a provider for the service rooted at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            model: "all-mpnet-base-v2".to_string(),
            encoding_format: "float".to_string(),
            single_timeout: DEFAULT_SINGLE_TIMEOUT,
            batch_timeout: DEFAULT_BATCH_TIMEOUT,
            client: reqwest::Client::new(),
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the encoding format.
    pub fn with_encoding_format(mut self, format: impl Into<String>) -> Self {
        self.encoding_format = format.into();
        self
    }

    /// Set the per-attempt timeouts.
    pub fn with_timeouts(mut self, single: Duration, batch: Duration) -> Self {
        self.single_timeout = single;
        self.batch_timeout = batch;
        self
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(EmbeddingError::ProviderNotConfigured)
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        route: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<reqwest::Response> {
        let api_key = self.api_key()?;
        let response = self
            .client
            .post(format!("{}{route}", self.base_url))
            .bearer_auth(api_key)
            .timeout(timeout)
            .json(body)
            .send()
            .await?;
        check_status(response).await
    }

    async fn get(&self, route: &str) -> Result<reqwest::Response> {
        let mut request = self
            .client
            .get(format!("{}{route}", self.base_url))
            .timeout(self.single_timeout);
        if let Some(key) = self.api_key.as_deref() {
            request = request.bearer_auth(key);
        }
        check_status(request.send().await?).await
    }
}

/// Map a non-success status onto the error taxonomy.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body: String = response
        .text()
        .await
        .unwrap_or_default()
        .chars()
        .take(200)
        .collect();

    if status == StatusCode::TOO_MANY_REQUESTS {
        Err(EmbeddingError::RateLimited)
    } else if status.is_server_error() {
        Err(EmbeddingError::Server {
            status: status.as_u16(),
            body,
        })
    } else {
        Err(EmbeddingError::Client {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for HttpProvider {
    fn name(&self) -> &str {
        "http"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        debug!(model = %self.model, "requesting embedding");

        let body = EmbedRequest {
            input: text,
            model: &self.model,
            encoding_format: &self.encoding_format,
        };
        let response = self.post("/embed", &body, self.single_timeout).await?;
        let result: EmbedResponse = response.json().await?;

        let embedding = result
            .data
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("No embedding in response".to_string()))?
            .embedding;

        debug!(dimension = embedding.len(), "received embedding");
        Ok(embedding)
    }

    async fn embed_batch(&self, inputs: &[BatchInput]) -> Result<Vec<BatchOutput>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            model = %self.model,
            items = inputs.len(),
            "requesting batch embeddings"
        );

        let body = BatchRequest {
            inputs,
            model: &self.model,
            encoding_format: &self.encoding_format,
        };
        let response = self.post("/embed/batch", &body, self.batch_timeout).await?;
        let result: BatchResponse = response.json().await?;

        info!("Generated {} batch embeddings", result.data.len());
        Ok(result.data)
    }

    async fn metadata(&self) -> Result<ProviderMetadata> {
        Ok(self.get("/metadata").await?.json().await?)
    }

    async fn health(&self) -> Result<bool> {
        let health: HealthResponse = self.get("/health").await?.json().await?;
        Ok(health.ready && health.status == "ok")
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    input: &'a str,
    model: &'a str,
    encoding_format: &'a str,
}

#[derive(Debug, Serialize)]
struct BatchRequest<'a> {
    inputs: &'a [BatchInput],
    model: &'a str,
    encoding_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Debug, Deserialize)]
struct EmbedData {
    embedding: Embedding,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    data: Vec<BatchOutput>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    #[serde(default)]
    ready: bool,
}
