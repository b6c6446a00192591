//! Similarity matrix and its builder
//!
//! The matrix holds cosine similarity for every (A index, B index) pair. It is
//! immutable: a merge produces a new matrix with the two affected rows (or
//! columns) collapsed into one, so only the merged element is ever rescored.

use crate::services::embedding::{Embedding, EmbeddingError, EmbeddingOracle};
use crate::types::{ParagraphSequence, Side};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Pairwise similarity, rows = sequence A, columns = sequence B
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    rows: usize,
    cols: usize,
    scores: Vec<f32>,
}

impl SimilarityMatrix {
    pub fn from_embeddings(a: &[Arc<Embedding>], b: &[Arc<Embedding>]) -> Self {
        let mut scores = Vec::with_capacity(a.len() * b.len());
        for ea in a {
            for eb in b {
                scores.push(ea.cosine(eb));
            }
        }
        Self {
            rows: a.len(),
            cols: b.len(),
            scores,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// # Panics
    /// Panics if either index is out of bounds.
    pub fn get(&self, row: usize, col: usize) -> f32 {
        assert!(row < self.rows && col < self.cols, "matrix index out of bounds");
        self.scores[row * self.cols + col]
    }

    /// Score addressed from the point of view of the longer sequence
    ///
    /// `l` indexes the sequence on `longer`, `s` the other one.
    pub fn oriented(&self, longer: Side, l: usize, s: usize) -> f32 {
        match longer {
            Side::A => self.get(l, s),
            Side::B => self.get(s, l),
        }
    }

    pub fn row(&self, row: usize) -> &[f32] {
        &self.scores[row * self.cols..(row + 1) * self.cols]
    }

    /// Positional scores `(i, i)` for `i < min(rows, cols)`
    pub fn diagonal(&self) -> Vec<f32> {
        (0..self.rows.min(self.cols)).map(|i| self.get(i, i)).collect()
    }

    /// New matrix where rows `index` and `index + 1` are replaced by `row`
    pub fn with_merged_row(&self, index: usize, row: Vec<f32>) -> Self {
        assert!(index + 1 < self.rows && row.len() == self.cols);
        let mut scores = Vec::with_capacity((self.rows - 1) * self.cols);
        scores.extend_from_slice(&self.scores[..index * self.cols]);
        scores.extend(row);
        scores.extend_from_slice(&self.scores[(index + 2) * self.cols..]);
        Self {
            rows: self.rows - 1,
            cols: self.cols,
            scores,
        }
    }

    /// New matrix where columns `index` and `index + 1` are replaced by `col`
    pub fn with_merged_col(&self, index: usize, col: Vec<f32>) -> Self {
        assert!(index + 1 < self.cols && col.len() == self.rows);
        let cols = self.cols - 1;
        let mut scores = Vec::with_capacity(self.rows * cols);
        for (r, merged) in col.into_iter().enumerate() {
            let row = self.row(r);
            scores.extend_from_slice(&row[..index]);
            scores.push(merged);
            scores.extend_from_slice(&row[index + 2..]);
        }
        Self {
            rows: self.rows,
            cols,
            scores,
        }
    }

    /// Collapse the merged pair on `side` at `index` into `scores`
    pub fn with_merged(&self, side: Side, index: usize, scores: Vec<f32>) -> Self {
        match side {
            Side::A => self.with_merged_row(index, scores),
            Side::B => self.with_merged_col(index, scores),
        }
    }
}

/// Per-invocation embedding front end
///
/// Caches every vector by text so a text is sent to the oracle at most once
/// per alignment, and enforces a single vector length for the whole request.
pub struct SimilarityMatrixBuilder<'a> {
    oracle: &'a dyn EmbeddingOracle,
    cache: HashMap<String, Arc<Embedding>>,
    dimensions: Option<usize>,
    texts_embedded: usize,
    oracle_calls: usize,
}

impl<'a> SimilarityMatrixBuilder<'a> {
    pub fn new(oracle: &'a dyn EmbeddingOracle) -> Self {
        Self {
            oracle,
            cache: HashMap::new(),
            dimensions: oracle.dimensions(),
            texts_embedded: 0,
            oracle_calls: 0,
        }
    }

    /// Distinct texts sent to the oracle so far
    pub fn texts_embedded(&self) -> usize {
        self.texts_embedded
    }

    /// Batched oracle requests issued so far
    pub fn oracle_calls(&self) -> usize {
        self.oracle_calls
    }

    pub fn cached(&self, text: &str) -> Option<Arc<Embedding>> {
        self.cache.get(text).cloned()
    }

    /// Embed `texts`, issuing at most one oracle call for the uncached ones
    ///
    /// Blank texts (the inserted title slot, empty paragraphs) are never sent
    /// to the oracle: they get a zero vector, which scores 0 against
    /// everything. Until the vector length is known they get a length-0
    /// placeholder that is not cached.
    ///
    /// # Errors
    /// Any oracle failure, a wrong number of vectors, a malformed vector or a
    /// vector of unexpected length fails the whole call; nothing from a
    /// failed batch is cached.
    pub async fn embed_texts(&mut self, texts: &[&str]) -> Result<Vec<Arc<Embedding>>, EmbeddingError> {
        let mut seen = HashSet::new();
        let missing: Vec<String> = texts
            .iter()
            .filter(|t| !is_blank(t) && !self.cache.contains_key(**t) && seen.insert(**t))
            .map(|t| t.to_string())
            .collect();

        if !missing.is_empty() {
            self.oracle_calls += 1;
            let vectors = self.oracle.embed_batch(&missing).await?;

            if vectors.len() != missing.len() {
                return Err(EmbeddingError::CountMismatch {
                    expected: missing.len(),
                    actual: vectors.len(),
                });
            }

            let mut fresh = Vec::with_capacity(vectors.len());
            for vector in vectors {
                let embedding = Embedding::new(vector)?;
                let expected = *self.dimensions.get_or_insert(embedding.dimensions());
                if embedding.dimensions() != expected {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected,
                        actual: embedding.dimensions(),
                    });
                }
                fresh.push(Arc::new(embedding));
            }

            self.texts_embedded += missing.len();
            self.cache.extend(missing.into_iter().zip(fresh));
        }

        texts
            .iter()
            .map(|t| {
                if is_blank(t) {
                    return Ok(self.blank());
                }
                self.cached(t)
                    .ok_or_else(|| EmbeddingError::Malformed(format!("no vector for text '{}'", t)))
            })
            .collect()
    }

    /// Zero vector for blank texts, shared once the length is known
    fn blank(&mut self) -> Arc<Embedding> {
        match self.dimensions {
            Some(dimensions) => self
                .cache
                .entry(String::new())
                .or_insert_with(|| Arc::new(Embedding::zero(dimensions)))
                .clone(),
            None => Arc::new(Embedding::zero(0)),
        }
    }

    /// Embed every element of `seq`
    pub async fn embed_sequence(
        &mut self,
        seq: &ParagraphSequence,
    ) -> Result<Vec<Arc<Embedding>>, EmbeddingError> {
        let texts = seq.texts();
        self.embed_texts(&texts).await
    }

    /// Embed both sequences in one oracle call and score every pair
    pub async fn build(
        &mut self,
        a: &ParagraphSequence,
        b: &ParagraphSequence,
    ) -> Result<SimilarityMatrix, EmbeddingError> {
        let (emb_a, emb_b) = self.embed_pair(a, b).await?;
        Ok(SimilarityMatrix::from_embeddings(&emb_a, &emb_b))
    }

    /// Embeddings of both sequences, fetched with a single oracle call
    pub async fn embed_pair(
        &mut self,
        a: &ParagraphSequence,
        b: &ParagraphSequence,
    ) -> Result<(Vec<Arc<Embedding>>, Vec<Arc<Embedding>>), EmbeddingError> {
        let mut texts = a.texts();
        texts.extend(b.texts());
        let mut all = self.embed_texts(&texts).await?;
        let emb_b = all.split_off(a.len());
        Ok((all, emb_b))
    }
}

fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}
