//! HTTP embedding client
//!
//! Talks to any OpenAI-compatible embeddings endpoint (hosted APIs, or local
//! servers fronting a sentence-transformers model such as LaBSE):
//!
//! ```text
//! POST {endpoint}   {"model": "...", "input": ["text", ...]}
//!              →    {"data": [{"index": 0, "embedding": [0.1, ...]}, ...]}
//! ```
//!
//! Requests are split into `batch_size` chunks, rate limited, and retried
//! with exponential backoff on transient failures only.
//!
//! These retries happen inside the oracle, below the alignment engine. The
//! engine itself never retries: once `embed_batch` returns an error the
//! article fails with `EmbeddingUnavailable`. One engine call can therefore
//! take up to `max_retries + 1` attempts per chunk; the alignment deadline
//! (`alignment.timeout_ms`) still bounds the whole call, backoff sleeps
//! included.

use super::{EmbeddingError, EmbeddingOracle};
use crate::utils::{retry_with_backoff, RetryPolicy};
use bitext_common::config::EmbeddingConfig;
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;

const USER_AGENT: &str = concat!("bitext-align/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

/// Embedding oracle backed by an HTTP endpoint
pub struct HttpEmbeddingClient {
    /// HTTP client with configured timeouts
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    dimensions: Option<usize>,
    batch_size: usize,
    retry: RetryPolicy,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl HttpEmbeddingClient {
    /// Create client from the `[embedding]` config section
    ///
    /// # Errors
    /// Returns `EmbeddingError::Unavailable` if the HTTP client cannot be built
    /// or the limits are zero.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::Unavailable(format!("HTTP client init failed: {}", e)))?;

        let per_second = NonZeroU32::new(config.requests_per_second).ok_or_else(|| {
            EmbeddingError::Unavailable("requests_per_second must be positive".to_string())
        })?;

        if config.batch_size == 0 {
            return Err(EmbeddingError::Unavailable(
                "batch_size must be positive".to_string(),
            ));
        }

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            dimensions: config.dimensions,
            batch_size: config.batch_size,
            retry: RetryPolicy::new(
                config.max_retries,
                Duration::from_millis(config.retry_base_delay_ms),
            ),
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// One request for one chunk, no retry
    async fn request_chunk(&self, chunk: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.rate_limiter.until_ready().await;

        let body = EmbeddingRequest {
            model: &self.model,
            input: chunk,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        tracing::debug!(
            endpoint = %self.endpoint,
            texts = chunk.len(),
            "Requesting embeddings"
        );

        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api(status.as_u16(), error_text));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Malformed(e.to_string()))?;

        order_by_index(parsed.data, chunk.len())
    }
}

fn map_reqwest_error(err: reqwest::Error) -> EmbeddingError {
    if err.is_timeout() {
        EmbeddingError::Timeout
    } else {
        EmbeddingError::Network(err.to_string())
    }
}

/// Put response items back into request order, rejecting gaps and duplicates
fn order_by_index(
    data: Vec<EmbeddingDatum>,
    expected: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if data.len() != expected {
        return Err(EmbeddingError::CountMismatch {
            expected,
            actual: data.len(),
        });
    }

    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for datum in data {
        let slot = slots.get_mut(datum.index).ok_or_else(|| {
            EmbeddingError::Malformed(format!("index {} out of range", datum.index))
        })?;
        if slot.is_some() {
            return Err(EmbeddingError::Malformed(format!(
                "duplicate index {}",
                datum.index
            )));
        }
        *slot = Some(datum.embedding);
    }

    slots
        .into_iter()
        .map(|s| s.ok_or_else(|| EmbeddingError::Malformed("missing index".to_string())))
        .collect()
}

#[async_trait::async_trait]
impl EmbeddingOracle for HttpEmbeddingClient {
    fn model(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut vectors = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(self.batch_size) {
            let chunk_vectors =
                retry_with_backoff("embedding batch", self.retry, || self.request_chunk(chunk))
                    .await?;
            vectors.extend(chunk_vectors);
        }

        Ok(vectors)
    }
}
