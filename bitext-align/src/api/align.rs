//! Alignment API handlers
//!
//! POST /align, POST /align/batch
//!
//! Bodies are parsed from raw bytes: malformed JSON or non-text paragraphs
//! are a 400 `INPUT_MISMATCH`, same as an article with both sides empty.

use axum::{body::Bytes, extract::State, routing::post, Json, Router};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::aligner::Aligner;
use crate::error::{ApiError, ApiResult};
use crate::services::record_assembler::{AlignedRecord, RecordAssembler};
use crate::types::{AlignmentOutcome, AlignmentStats, DegradedReason, MergeRecord};
use crate::workflow::{align_articles, ArticleInput, ArticleReport, BatchSummary};
use crate::AppState;

/// POST /align request
#[derive(Debug, Deserialize)]
pub struct AlignRequest {
    #[serde(alias = "english")]
    pub a: Vec<String>,
    #[serde(alias = "khmer")]
    pub b: Vec<String>,
    /// Overrides the configured tolerance for this request
    #[serde(default)]
    pub tolerance: Option<f32>,
}

/// POST /align response
#[derive(Debug, Serialize)]
pub struct AlignResponse {
    /// "balanced" or "degraded"
    pub status: String,
    pub residual: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DegradedReason>,
    pub records: Vec<AlignedRecord>,
    pub scores: Vec<Option<f32>>,
    pub merges: Vec<MergeRecord>,
    pub stats: AlignmentStats,
}

impl From<AlignmentOutcome> for AlignResponse {
    fn from(outcome: AlignmentOutcome) -> Self {
        let residual = outcome.residual();
        let (status, reason, result) = match outcome {
            AlignmentOutcome::Balanced(result) => ("balanced", None, result),
            AlignmentOutcome::Degraded(degraded) => {
                ("degraded", Some(degraded.reason), degraded.partial)
            }
        };

        Self {
            status: status.to_string(),
            residual,
            reason,
            records: RecordAssembler::new().assemble(&result.pairs),
            scores: result.scores(),
            merges: result.merges,
            stats: result.stats,
        }
    }
}

/// POST /align/batch request
#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub articles: Vec<ArticleInput>,
    #[serde(default)]
    pub tolerance: Option<f32>,
}

/// POST /align/batch response
#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub summary: BatchSummary,
    pub articles: Vec<ArticleReport>,
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> ApiResult<T> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))
}

fn aligner_for(state: &AppState, tolerance: Option<f32>) -> ApiResult<Aligner> {
    match tolerance {
        Some(t) => state
            .aligner
            .with_tolerance(t)
            .map_err(|e| ApiError::BadRequest(e.to_string())),
        None => Ok(state.aligner.as_ref().clone()),
    }
}

/// POST /align
///
/// Align one article. A degraded outcome is still 200: the caller decides
/// whether to keep it.
pub async fn align(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<AlignResponse>> {
    let request: AlignRequest = parse_body(&body)?;
    let aligner = aligner_for(&state, request.tolerance)?;

    let _permit = state
        .alignment_slots
        .acquire()
        .await
        .map_err(|e| ApiError::Internal(format!("Alignment slots closed: {}", e)))?;

    let outcome = aligner.align_article(&request.a, &request.b).await?;

    Ok(Json(AlignResponse::from(outcome)))
}

/// POST /align/batch
///
/// Align several articles, reporting each one separately. One failing
/// article does not fail the request.
pub async fn align_batch(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<BatchResponse>> {
    let request: BatchRequest = parse_body(&body)?;
    let aligner = aligner_for(&state, request.tolerance)?;

    let concurrency = state.batch_concurrency.clamp(1, state.max_concurrent_alignments);
    let _permits = state
        .alignment_slots
        .acquire_many(concurrency as u32)
        .await
        .map_err(|e| ApiError::Internal(format!("Alignment slots closed: {}", e)))?;

    let reports = align_articles(
        &aligner,
        request.articles,
        concurrency,
        CancellationToken::new(),
    )
    .await;
    let summary = BatchSummary::from_reports(&reports);
    summary.log();

    Ok(Json(BatchResponse {
        summary,
        articles: reports,
    }))
}

/// Build alignment routes
pub fn align_routes() -> Router<AppState> {
    Router::new()
        .route("/align", post(align))
        .route("/align/batch", post(align_batch))
}
