//! Embedding oracle seam
//!
//! The aligner never embeds text itself. It consumes an injected
//! [`EmbeddingOracle`]: a pure function from text to a fixed-length vector,
//! safe for concurrent read-only use across alignment tasks.

mod hashing;
mod http_client;

pub use hashing::HashingEmbedder;
pub use http_client::HttpEmbeddingClient;

use bitext_common::config::{EmbeddingConfig, OracleKind};
use std::sync::Arc;
use thiserror::Error;

/// Oracle failure. Every variant surfaces to the engine as
/// `EmbeddingUnavailable`.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Expected {expected} vectors, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Oracle unavailable: {0}")]
    Unavailable(String),
}

impl EmbeddingError {
    /// Worth retrying: network trouble, timeouts, throttling, server errors
    pub fn is_transient(&self) -> bool {
        match self {
            EmbeddingError::Network(_) | EmbeddingError::Timeout => true,
            EmbeddingError::Api(status, _) => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Text → vector capability injected into the aligner
///
/// Implementations must be deterministic for identical input text and free
/// of side effects visible to the aligner.
#[async_trait::async_trait]
pub trait EmbeddingOracle: Send + Sync {
    /// Model identifier, for logging and diagnostics
    fn model(&self) -> &str;

    /// Fixed vector length, when known up front
    fn dimensions(&self) -> Option<usize> {
        None
    }

    /// Embed `texts`, returning one vector per text in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        match vectors.len() {
            1 => Ok(vectors.remove(0)),
            n => Err(EmbeddingError::CountMismatch {
                expected: 1,
                actual: n,
            }),
        }
    }
}

/// A validated embedding vector
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    vector: Vec<f32>,
    norm: f32,
}

impl Embedding {
    /// Validate and wrap an oracle vector
    ///
    /// Empty vectors and non-finite components are malformed.
    pub fn new(vector: Vec<f32>) -> Result<Self, EmbeddingError> {
        if vector.is_empty() {
            return Err(EmbeddingError::Malformed("empty vector".to_string()));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(EmbeddingError::Malformed(
                "vector contains non-finite values".to_string(),
            ));
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        Ok(Self { vector, norm })
    }

    /// All-zero vector of `dimensions` components, standing in for blank text
    pub fn zero(dimensions: usize) -> Self {
        Self {
            vector: vec![0.0; dimensions],
            norm: 0.0,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.vector.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.vector
    }

    /// Cosine similarity in [-1, 1]; 0 when either vector is all zeros
    pub fn cosine(&self, other: &Embedding) -> f32 {
        if self.vector.len() != other.vector.len() {
            return 0.0;
        }
        let denom = self.norm * other.norm;
        if denom < f32::EPSILON {
            return 0.0;
        }
        let dot: f32 = self
            .vector
            .iter()
            .zip(other.vector.iter())
            .map(|(a, b)| a * b)
            .sum();
        (dot / denom).clamp(-1.0, 1.0)
    }
}

/// Construct the configured oracle
pub fn build_oracle(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingOracle>, EmbeddingError> {
    match config.kind {
        OracleKind::Http => Ok(Arc::new(HttpEmbeddingClient::from_config(config)?)),
        OracleKind::Hashing => Ok(Arc::new(HashingEmbedder::new(
            config.dimensions.unwrap_or(hashing::DEFAULT_DIMENSIONS),
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical_and_opposite() {
        let a = Embedding::new(vec![1.0, 2.0, 3.0]).unwrap();
        let b = Embedding::new(vec![-1.0, -2.0, -3.0]).unwrap();
        assert!((a.cosine(&a) - 1.0).abs() < 1e-6);
        assert!((a.cosine(&b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_is_symmetric() {
        let a = Embedding::new(vec![0.3, 0.1, 0.9]).unwrap();
        let b = Embedding::new(vec![0.5, 0.7, 0.2]).unwrap();
        assert_eq!(a.cosine(&b), b.cosine(&a));
    }

    #[test]
    fn test_zero_vector_scores_zero() {
        let zero = Embedding::new(vec![0.0, 0.0]).unwrap();
        let other = Embedding::new(vec![1.0, 0.0]).unwrap();
        assert_eq!(zero.cosine(&other), 0.0);
    }

    #[test]
    fn test_malformed_vectors_rejected() {
        assert!(matches!(Embedding::new(vec![]), Err(EmbeddingError::Malformed(_))));
        assert!(matches!(
            Embedding::new(vec![1.0, f32::NAN]),
            Err(EmbeddingError::Malformed(_))
        ));
    }

    #[test]
    fn test_transient_classification() {
        assert!(EmbeddingError::Timeout.is_transient());
        assert!(EmbeddingError::Api(503, String::new()).is_transient());
        assert!(EmbeddingError::Api(429, String::new()).is_transient());
        assert!(!EmbeddingError::Api(400, String::new()).is_transient());
        assert!(!EmbeddingError::Malformed(String::new()).is_transient());
    }
}
