//! Alignment engine
//!
//! Reduces a paragraph-count mismatch by merging adjacent elements of the
//! longer sequence until both sequences have equal length, then pairs them
//! positionally.
//!
//! # States
//! - **Balanced**: `|A| == |B|`, terminal success. Reached immediately when
//!   the counts already match, whatever the similarity scores say.
//! - **Unbalanced**: `|A| != |B|`, a merge is required.
//! - **Stuck**: no merge passes the tolerance gate, or a budget ran out.
//!   Terminal, reported as `AlignmentOutcome::Degraded` with the best partial
//!   pairing so far.
//!
//! The engine is sequential within one invocation: each merge depends on the
//! previous one. Independent invocations share nothing but the oracle.

mod candidates;
mod global;
mod greedy;

pub use bitext_common::config::MergeStrategy;
pub use candidates::{anchor, propose, select, Proposal};

use crate::error::{AlignError, AlignResult};
use crate::services::embedding::{EmbeddingError, EmbeddingOracle};
use crate::services::similarity::SimilarityMatrixBuilder;
use crate::types::{
    AlignedPair, AlignmentDegraded, AlignmentOutcome, AlignmentResult, AlignmentStats,
    DegradedReason, MergeRecord, ParagraphSequence, Side,
};
use bitext_common::config::{AlignmentSettings, ToleranceModeKind, DEFAULT_TOLERANCE};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Configuration
// ============================================================================

/// How accepted merges are bounded
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ToleranceMode {
    /// Each merge's delta is compared to the tolerance on its own; repeated
    /// small losses can compound
    PerMerge,
    /// Per-merge check plus a bound on the sum of negative deltas
    Cumulative { budget: f32 },
}

/// Engine parameters for one request
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentConfig {
    /// Maximum acceptable similarity regression of one merge (≤ 0)
    pub tolerance: f32,
    pub join_token: String,
    pub strategy: MergeStrategy,
    pub tolerance_mode: ToleranceMode,
    pub max_merges: Option<usize>,
    pub timeout: Option<Duration>,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            join_token: " ".to_string(),
            strategy: MergeStrategy::Greedy,
            tolerance_mode: ToleranceMode::PerMerge,
            max_merges: None,
            timeout: None,
        }
    }
}

impl AlignmentConfig {
    pub fn from_settings(settings: &AlignmentSettings) -> Self {
        Self {
            tolerance: settings.tolerance,
            join_token: settings.join_token.clone(),
            strategy: settings.strategy,
            tolerance_mode: match settings.tolerance_mode {
                ToleranceModeKind::PerMerge => ToleranceMode::PerMerge,
                ToleranceModeKind::Cumulative => ToleranceMode::Cumulative {
                    budget: settings.cumulative_budget,
                },
            },
            max_merges: settings.max_merges,
            timeout: settings.timeout_ms.map(Duration::from_millis),
        }
    }

    pub fn validate(&self) -> AlignResult<()> {
        if !self.tolerance.is_finite() || self.tolerance > 0.0 {
            return Err(config_error(format!(
                "tolerance must be a finite value <= 0, got {}",
                self.tolerance
            )));
        }
        if let ToleranceMode::Cumulative { budget } = self.tolerance_mode {
            if !budget.is_finite() || budget > 0.0 {
                return Err(config_error(format!(
                    "cumulative budget must be a finite value <= 0, got {}",
                    budget
                )));
            }
        }
        Ok(())
    }
}

fn config_error(message: String) -> AlignError {
    AlignError::Common(bitext_common::Error::Config(message))
}

/// Coarse limits on one `align` call
#[derive(Debug, Clone, Default)]
pub struct AlignmentBudget {
    pub max_merges: Option<usize>,
    pub deadline: Option<Instant>,
    pub cancel: Option<CancellationToken>,
}

impl AlignmentBudget {
    /// Budget from config, with the timeout counted from now
    pub fn from_config(config: &AlignmentConfig) -> Self {
        Self {
            max_merges: config.max_merges,
            deadline: config.timeout.map(|t| Instant::now() + t),
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Reason to stop before attempting merge number `merges_done + 1`
    fn interruption(&self, merges_done: usize) -> Option<DegradedReason> {
        if self.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
            return Some(DegradedReason::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Some(DegradedReason::DeadlineExceeded);
        }
        match self.max_merges {
            Some(max) if merges_done >= max => {
                Some(DegradedReason::MergeBudgetExhausted { max_merges: max })
            }
            _ => None,
        }
    }
}

// ============================================================================
// Tolerance gate
// ============================================================================

/// Acceptance gate for merges, with accumulated drift for cumulative mode
#[derive(Debug, Clone)]
pub(crate) struct ToleranceGate {
    tolerance: f32,
    mode: ToleranceMode,
    drift: f32,
}

impl ToleranceGate {
    pub(crate) fn new(config: &AlignmentConfig) -> Self {
        Self {
            tolerance: config.tolerance,
            mode: config.tolerance_mode,
            drift: 0.0,
        }
    }

    /// Would a merge with `delta` be accepted?
    pub(crate) fn check(&self, delta: f32) -> Result<(), DegradedReason> {
        if delta < self.tolerance {
            return Err(DegradedReason::ToleranceNotMet { best_delta: delta });
        }
        if let ToleranceMode::Cumulative { budget } = self.mode {
            let drift = self.drift + delta.min(0.0);
            if drift < budget {
                return Err(DegradedReason::CumulativeDriftExceeded { drift });
            }
        }
        Ok(())
    }

    pub(crate) fn accept(&mut self, delta: f32) {
        self.drift += delta.min(0.0);
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Merge-search engine over normalized sequences
#[derive(Clone)]
pub struct AlignmentEngine {
    oracle: Arc<dyn EmbeddingOracle>,
    config: AlignmentConfig,
}

impl AlignmentEngine {
    pub fn new(oracle: Arc<dyn EmbeddingOracle>, config: AlignmentConfig) -> Self {
        Self { oracle, config }
    }

    pub fn config(&self) -> &AlignmentConfig {
        &self.config
    }

    pub fn oracle(&self) -> &Arc<dyn EmbeddingOracle> {
        &self.oracle
    }

    /// Align with the configured merge budget and timeout
    pub async fn align(
        &self,
        a: ParagraphSequence,
        b: ParagraphSequence,
    ) -> AlignResult<AlignmentOutcome> {
        self.align_with_budget(a, b, AlignmentBudget::from_config(&self.config))
            .await
    }

    /// Align under an explicit budget
    ///
    /// # Errors
    /// - `InputMismatch` when both sequences are empty or the sides are swapped
    ///   (no oracle call is made)
    /// - `EmbeddingUnavailable` when the oracle fails at any point
    pub async fn align_with_budget(
        &self,
        a: ParagraphSequence,
        b: ParagraphSequence,
        budget: AlignmentBudget,
    ) -> AlignResult<AlignmentOutcome> {
        let started = Instant::now();

        if a.side() != Side::A || b.side() != Side::B {
            return Err(AlignError::InputMismatch(
                "sequences must be passed as (A, B)".to_string(),
            ));
        }
        if a.is_empty() && b.is_empty() {
            return Err(AlignError::InputMismatch("both sequences are empty".to_string()));
        }
        if a.is_empty() || b.is_empty() {
            let stats = AlignmentStats {
                elapsed: started.elapsed(),
                ..AlignmentStats::default()
            };
            return Ok(degraded(&a, &b, &[], Vec::new(), DegradedReason::EmptyCounterpart, stats));
        }

        let mut builder = SimilarityMatrixBuilder::new(self.oracle.as_ref());
        let run = Run {
            config: &self.config,
            budget: &budget,
            started,
        };

        match self.config.strategy {
            MergeStrategy::Greedy => greedy::align(&run, &mut builder, a, b).await,
            MergeStrategy::Global => global::align(&run, &mut builder, a, b).await,
        }
    }
}

/// Per-invocation context shared by the strategies
pub(crate) struct Run<'a> {
    pub(crate) config: &'a AlignmentConfig,
    pub(crate) budget: &'a AlignmentBudget,
    pub(crate) started: Instant,
}

impl Run<'_> {
    pub(crate) fn stats(&self, builder: &SimilarityMatrixBuilder<'_>, merges: usize) -> AlignmentStats {
        AlignmentStats {
            merges,
            texts_embedded: builder.texts_embedded(),
            oracle_calls: builder.oracle_calls(),
            elapsed: self.started.elapsed(),
        }
    }
}

/// Oracle call outcome when raced against cancellation and the deadline
pub(crate) enum Guarded<T> {
    Done(T),
    Interrupted(DegradedReason),
}

/// Await an oracle call unless the budget's cancellation or deadline fires first
pub(crate) async fn guarded<T, F>(budget: &AlignmentBudget, call: F) -> AlignResult<Guarded<T>>
where
    F: Future<Output = Result<T, EmbeddingError>>,
{
    let cancelled = async {
        match &budget.cancel {
            Some(token) => token.cancelled().await,
            None => std::future::pending::<()>().await,
        }
    };
    let expired = async {
        match budget.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        biased;
        _ = cancelled => Ok(Guarded::Interrupted(DegradedReason::Cancelled)),
        _ = expired => Ok(Guarded::Interrupted(DegradedReason::DeadlineExceeded)),
        result = call => Ok(Guarded::Done(result?)),
    }
}

// ============================================================================
// Pairing
// ============================================================================

/// Pair element i of A with element i of B
///
/// When lengths differ the excess elements are paired with empty text, so
/// every element lands in exactly one pair. `scores[i]` is attached to pair i
/// when both sides exist.
pub(crate) fn positional_pairs(
    a: &ParagraphSequence,
    b: &ParagraphSequence,
    scores: &[f32],
) -> Vec<AlignedPair> {
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| {
            let seg_a = a.segment(i);
            let seg_b = b.segment(i);
            let score = match (seg_a, seg_b) {
                (Some(_), Some(_)) => scores.get(i).copied(),
                _ => None,
            };
            AlignedPair {
                text_a: seg_a.map(|s| s.text.clone()).unwrap_or_default(),
                text_b: seg_b.map(|s| s.text.clone()).unwrap_or_default(),
                origin_a: seg_a.map(|s| s.origin.clone()),
                origin_b: seg_b.map(|s| s.origin.clone()),
                score,
            }
        })
        .collect()
}

pub(crate) fn balanced(
    a: &ParagraphSequence,
    b: &ParagraphSequence,
    scores: &[f32],
    merges: Vec<MergeRecord>,
    stats: AlignmentStats,
) -> AlignmentOutcome {
    AlignmentOutcome::Balanced(AlignmentResult {
        pairs: positional_pairs(a, b, scores),
        merges,
        stats,
    })
}

pub(crate) fn degraded(
    a: &ParagraphSequence,
    b: &ParagraphSequence,
    scores: &[f32],
    merges: Vec<MergeRecord>,
    reason: DegradedReason,
    stats: AlignmentStats,
) -> AlignmentOutcome {
    let longer = if a.len() >= b.len() { Side::A } else { Side::B };
    AlignmentOutcome::Degraded(AlignmentDegraded {
        partial: AlignmentResult {
            pairs: positional_pairs(a, b, scores),
            merges,
            stats,
        },
        residual: a.len().abs_diff(b.len()),
        longer,
        reason,
    })
}
