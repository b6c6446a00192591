//! bitext-align library interface
//!
//! Paragraph-level alignment of two language versions of one article:
//! - `services::normalizer` cleans both paragraph lists
//! - `services::embedding` is the injected text → vector oracle
//! - `services::similarity` scores every paragraph pair
//! - `engine` merges adjacent paragraphs of the longer side until the counts match
//! - `services::record_assembler` numbers the resulting pairs
//!
//! `workflow`, `db` and `api` are the batch, persistence and HTTP surfaces.

pub mod aligner;
pub mod api;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod services;
pub mod types;
pub mod utils;
pub mod workflow;

pub use crate::aligner::Aligner;
pub use crate::engine::{
    AlignmentBudget, AlignmentConfig, AlignmentEngine, MergeStrategy, ToleranceMode,
};
pub use crate::error::{AlignError, AlignResult, ApiError, ApiResult};
pub use crate::types::{AlignedPair, AlignmentOutcome, DegradedReason, ParagraphSequence, Side};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Normalizer + engine over the configured oracle
    pub aligner: Arc<Aligner>,
    /// Bounds concurrent alignments across all requests
    pub alignment_slots: Arc<Semaphore>,
    pub max_concurrent_alignments: usize,
    /// Articles aligned at once within one batch request
    pub batch_concurrency: usize,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(aligner: Aligner, max_concurrent_alignments: usize, batch_concurrency: usize) -> Self {
        let max_concurrent_alignments = max_concurrent_alignments.max(1);
        Self {
            aligner: Arc::new(aligner),
            alignment_slots: Arc::new(Semaphore::new(max_concurrent_alignments)),
            max_concurrent_alignments,
            batch_concurrency: batch_concurrency.max(1),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::align_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
