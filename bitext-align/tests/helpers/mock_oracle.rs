//! Table-driven embedding oracle
//!
//! Every text the test expects to be embedded gets an explicit vector, so
//! similarity scores are known exactly. Unknown texts fail the call, and an
//! empty text is a 400 like a hosted embeddings endpoint returns.

use async_trait::async_trait;
use bitext_align::services::embedding::{EmbeddingError, EmbeddingOracle};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
pub struct MockOracle {
    vectors: HashMap<String, Vec<f32>>,
    calls: AtomicUsize,
    embedded: Mutex<Vec<String>>,
    /// 1-based call number that fails with `Unavailable`
    fail_on_call: Option<usize>,
    delay: Option<Duration>,
}

impl MockOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, text: &str, vector: &[f32]) -> Self {
        self.vectors.insert(text.to_string(), vector.to_vec());
        self
    }

    pub fn failing_on_call(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Batched requests received so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every text received, in request order
    pub fn embedded(&self) -> Vec<String> {
        self.embedded.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmbeddingOracle for MockOracle {
    fn model(&self) -> &str {
        "mock"
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_on_call == Some(call) {
            return Err(EmbeddingError::Unavailable(format!("injected failure on call {}", call)));
        }

        if texts.iter().any(|t| t.is_empty()) {
            return Err(EmbeddingError::Api(400, "input must not be empty".to_string()));
        }

        self.embedded.lock().unwrap().extend(texts.iter().cloned());

        texts
            .iter()
            .map(|t| {
                self.vectors
                    .get(t)
                    .cloned()
                    .ok_or_else(|| EmbeddingError::Unavailable(format!("no vector for '{}'", t)))
            })
            .collect()
    }
}
