//! Aligner facade: normalizer followed by the alignment engine
//!
//! Cheap to clone and safe to share across concurrent tasks; every call
//! builds its own sequences, matrix and embedding cache.

use crate::engine::{AlignmentBudget, AlignmentConfig, AlignmentEngine};
use crate::error::AlignResult;
use crate::services::embedding::EmbeddingOracle;
use crate::services::normalizer::{NormalizerOptions, TextNormalizer};
use crate::types::{AlignmentOutcome, ParagraphSequence, Side};
use bitext_common::config::AlignmentSettings;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct Aligner {
    normalizer: TextNormalizer,
    engine: AlignmentEngine,
}

impl Aligner {
    /// # Errors
    /// Returns a config error if `config` fails validation.
    pub fn new(
        oracle: Arc<dyn EmbeddingOracle>,
        config: AlignmentConfig,
        options: NormalizerOptions,
    ) -> AlignResult<Self> {
        config.validate()?;
        Ok(Self {
            normalizer: TextNormalizer::new(options),
            engine: AlignmentEngine::new(oracle, config),
        })
    }

    /// Build from the `[alignment]` config section
    pub fn from_settings(
        oracle: Arc<dyn EmbeddingOracle>,
        settings: &AlignmentSettings,
    ) -> AlignResult<Self> {
        let options = NormalizerOptions {
            insert_missing_title: settings.insert_missing_title,
            clear_decorations: settings.clear_decorations,
        };
        Self::new(oracle, AlignmentConfig::from_settings(settings), options)
    }

    /// Copy of this aligner with a different tolerance
    pub fn with_tolerance(&self, tolerance: f32) -> AlignResult<Self> {
        let config = AlignmentConfig {
            tolerance,
            ..self.engine.config().clone()
        };
        config.validate()?;
        Ok(Self {
            normalizer: self.normalizer.clone(),
            engine: AlignmentEngine::new(self.engine.oracle().clone(), config),
        })
    }

    pub fn config(&self) -> &AlignmentConfig {
        self.engine.config()
    }

    pub fn engine(&self) -> &AlignmentEngine {
        &self.engine
    }

    pub fn model(&self) -> &str {
        self.engine.oracle().model()
    }

    /// Normalize and align one article
    pub async fn align_article(&self, raw_a: &[String], raw_b: &[String]) -> AlignResult<AlignmentOutcome> {
        self.align_article_with_cancel(raw_a, raw_b, None).await
    }

    /// Normalize and align one article, stopping early if `cancel` fires
    pub async fn align_article_with_cancel(
        &self,
        raw_a: &[String],
        raw_b: &[String],
        cancel: Option<CancellationToken>,
    ) -> AlignResult<AlignmentOutcome> {
        let (a, b) = self.normalizer.normalize(raw_a, raw_b);
        let mut budget = AlignmentBudget::from_config(self.engine.config());
        if let Some(token) = cancel {
            budget = budget.with_cancel(token);
        }

        self.engine
            .align_with_budget(
                ParagraphSequence::new(Side::A, a),
                ParagraphSequence::new(Side::B, b),
                budget,
            )
            .await
    }
}
