//! Concurrent batch alignment
//!
//! Articles are independent, so up to `concurrency` alignments run at once.
//! `buffered` (not `buffer_unordered`) keeps reports in input order, which
//! keeps record numbering stable between runs. A failed article is
//! reported and the batch continues.

use crate::aligner::Aligner;
use crate::error::AlignResult;
use crate::services::record_assembler::{AlignedRecord, RecordAssembler};
use crate::types::{AlignedPair, AlignmentOutcome, DegradedReason};
use crate::workflow::input::ArticleInput;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// How one article ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ArticleStatus {
    Aligned,
    Degraded { reason: DegradedReason, residual: usize },
    Failed { error: String },
    /// Batch cancelled before this article finished
    Cancelled,
}

/// Per-article result of a batch run
#[derive(Debug, Clone, Serialize)]
pub struct ArticleReport {
    /// Position in the input
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub status: ArticleStatus,
    pub pairs: Vec<AlignedPair>,
    pub merges: usize,
}

impl ArticleReport {
    fn new(index: usize, article: &ArticleInput, result: AlignResult<AlignmentOutcome>) -> Self {
        let (status, pairs, merges) = match result {
            Ok(AlignmentOutcome::Balanced(result)) => {
                (ArticleStatus::Aligned, result.pairs, result.merges.len())
            }
            Ok(AlignmentOutcome::Degraded(degraded)) => {
                let status = match degraded.reason {
                    DegradedReason::Cancelled => ArticleStatus::Cancelled,
                    reason => ArticleStatus::Degraded {
                        reason,
                        residual: degraded.residual,
                    },
                };
                (status, degraded.partial.pairs, degraded.partial.merges.len())
            }
            Err(e) => (
                ArticleStatus::Failed {
                    error: e.to_string(),
                },
                Vec::new(),
                0,
            ),
        };

        Self {
            index,
            id: article.id.clone(),
            url: article.url.clone(),
            status,
            pairs,
            merges,
        }
    }

    fn cancelled(index: usize, article: &ArticleInput) -> Self {
        Self {
            index,
            id: article.id.clone(),
            url: article.url.clone(),
            status: ArticleStatus::Cancelled,
            pairs: Vec::new(),
            merges: 0,
        }
    }
}

/// Align every article, at most `concurrency` at a time
///
/// Articles not started when `cancel` fires are reported as cancelled without
/// touching the oracle; articles in flight stop at their next checkpoint.
pub async fn align_articles(
    aligner: &Aligner,
    articles: Vec<ArticleInput>,
    concurrency: usize,
    cancel: CancellationToken,
) -> Vec<ArticleReport> {
    let total = articles.len();

    stream::iter(articles.into_iter().enumerate())
        .map(|(index, article)| {
            let cancel = cancel.clone();
            async move {
                if cancel.is_cancelled() {
                    return ArticleReport::cancelled(index, &article);
                }

                let label = article.label(index);
                tracing::debug!(
                    article = %label,
                    len_a = article.a.len(),
                    len_b = article.b.len(),
                    "Aligning article"
                );

                let result = aligner
                    .align_article_with_cancel(&article.a, &article.b, Some(cancel))
                    .await;

                match &result {
                    Ok(AlignmentOutcome::Balanced(r)) => tracing::info!(
                        article = %label,
                        pairs = r.pairs.len(),
                        merges = r.merges.len(),
                        "Article aligned"
                    ),
                    Ok(AlignmentOutcome::Degraded(d)) => tracing::warn!(
                        article = %label,
                        residual = d.residual,
                        longer = %d.longer,
                        reason = %d.reason,
                        "Article alignment degraded"
                    ),
                    Err(e) => tracing::error!(
                        article = %label,
                        error = %e,
                        "Article alignment failed"
                    ),
                }

                ArticleReport::new(index, &article, result)
            }
        })
        .buffered(concurrency.max(1))
        .inspect(|report| {
            if (report.index + 1) % 10 == 0 || report.index + 1 == total {
                tracing::info!(
                    progress = format!("{}/{}", report.index + 1, total),
                    "Batch progress"
                );
            }
        })
        .collect()
        .await
}

/// Totals of a batch run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub articles: usize,
    pub aligned: usize,
    pub degraded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub pairs: usize,
    pub merges: usize,
}

impl BatchSummary {
    pub fn from_reports(reports: &[ArticleReport]) -> Self {
        let mut summary = Self {
            articles: reports.len(),
            ..Self::default()
        };
        for report in reports {
            match report.status {
                ArticleStatus::Aligned => summary.aligned += 1,
                ArticleStatus::Degraded { .. } => summary.degraded += 1,
                ArticleStatus::Failed { .. } => summary.failed += 1,
                ArticleStatus::Cancelled => summary.cancelled += 1,
            }
            summary.pairs += report.pairs.len();
            summary.merges += report.merges;
        }
        summary
    }

    pub fn log(&self) {
        tracing::info!(
            articles = self.articles,
            aligned = self.aligned,
            degraded = self.degraded,
            failed = self.failed,
            cancelled = self.cancelled,
            pairs = self.pairs,
            merges = self.merges,
            "Batch completed"
        );
    }
}

/// Number the pairs of every accepted article, in report order
///
/// Aligned articles are always accepted; degraded ones only with
/// `accept_degraded`. Failed and cancelled articles produce no records.
pub fn collect_records(
    reports: &[ArticleReport],
    accept_degraded: bool,
    assembler: &mut RecordAssembler,
) -> Vec<AlignedRecord> {
    reports
        .iter()
        .filter(|r| match r.status {
            ArticleStatus::Aligned => true,
            ArticleStatus::Degraded { .. } => accept_degraded,
            ArticleStatus::Failed { .. } | ArticleStatus::Cancelled => false,
        })
        .flat_map(|r| assembler.assemble(&r.pairs))
        .collect()
}
