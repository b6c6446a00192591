//! Service modules for paragraph alignment
//!
//! The oracle seam, the normalizer, the similarity matrix and the record
//! assembler. The merge search itself lives in [`crate::engine`].

pub mod embedding;
pub mod normalizer;
pub mod record_assembler;
pub mod similarity;

pub use embedding::{
    build_oracle, Embedding, EmbeddingError, EmbeddingOracle, HashingEmbedder,
    HttpEmbeddingClient,
};
pub use normalizer::{NormalizerOptions, TextNormalizer};
pub use record_assembler::{AlignedRecord, RecordAssembler};
pub use similarity::{SimilarityMatrix, SimilarityMatrixBuilder};
