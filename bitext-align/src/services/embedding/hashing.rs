//! Offline hashing embedder
//!
//! Character trigram feature hashing into a fixed number of buckets,
//! L2-normalised. It captures surface overlap only, so it is only meaningful
//! when both sequences share a script (smoke runs, tests), never for real
//! cross-language alignment.

use super::{EmbeddingError, EmbeddingOracle};

pub(super) const DEFAULT_DIMENSIONS: usize = 256;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Deterministic, dependency-free embedding oracle
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
    model: String,
}

impl HashingEmbedder {
    /// # Panics
    /// Panics if `dimensions` is zero.
    pub fn new(dimensions: usize) -> Self {
        assert!(dimensions > 0, "hashing embedder needs at least one bucket");
        Self {
            dimensions,
            model: format!("hashing-trigram-{}", dimensions),
        }
    }

    /// Embed one text
    pub fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let chars: Vec<char> = text.to_lowercase().chars().collect();

        if chars.is_empty() {
            return vector;
        }

        // Pad so short texts still produce features
        let padded: Vec<char> = std::iter::once(' ')
            .chain(chars)
            .chain(std::iter::once(' '))
            .collect();

        for window in padded.windows(3) {
            let bucket = (fnv1a(window) % self.dimensions as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

fn fnv1a(chars: &[char]) -> u64 {
    let mut hash = FNV_OFFSET;
    for c in chars {
        let mut buf = [0u8; 4];
        for byte in c.encode_utf8(&mut buf).bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    }
    hash
}

#[async_trait::async_trait]
impl EmbeddingOracle for HashingEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> Option<usize> {
        Some(self.dimensions)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }
}
