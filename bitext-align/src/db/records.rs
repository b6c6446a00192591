//! Aligned record persistence
//!
//! A run and all of its records are written in one transaction, so a reader
//! never sees a run with half of its records.

use crate::error::AlignResult;
use crate::services::record_assembler::AlignedRecord;
use crate::workflow::batch::BatchSummary;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Stored run header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRow {
    pub run_id: Uuid,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub articles: i64,
    pub aligned: i64,
    pub degraded: i64,
    pub failed: i64,
    pub records: i64,
}

/// Save a finished run with its records
pub async fn save_run(
    pool: &SqlitePool,
    run_id: Uuid,
    started_at: DateTime<Utc>,
    summary: &BatchSummary,
    records: &[AlignedRecord],
) -> AlignResult<()> {
    let run_key = run_id.to_string();
    let finished_at = Utc::now().to_rfc3339();

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO alignment_runs (
            run_id, started_at, finished_at, articles, aligned, degraded, failed, records
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&run_key)
    .bind(started_at.to_rfc3339())
    .bind(&finished_at)
    .bind(summary.articles as i64)
    .bind(summary.aligned as i64)
    .bind(summary.degraded as i64)
    .bind(summary.failed as i64)
    .bind(records.len() as i64)
    .execute(&mut *tx)
    .await?;

    for record in records {
        sqlx::query(
            "INSERT INTO aligned_records (run_id, record_id, text_a, text_b) VALUES (?, ?, ?, ?)",
        )
        .bind(&run_key)
        .bind(record.id as i64)
        .bind(&record.text_a)
        .bind(&record.text_b)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        run_id = %run_id,
        records = records.len(),
        "Saved alignment run"
    );

    Ok(())
}

/// Records of one run, by id
pub async fn load_records(pool: &SqlitePool, run_id: Uuid) -> AlignResult<Vec<AlignedRecord>> {
    let rows = sqlx::query(
        "SELECT record_id, text_a, text_b FROM aligned_records WHERE run_id = ? ORDER BY record_id",
    )
    .bind(run_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| -> AlignResult<AlignedRecord> {
            Ok(AlignedRecord {
                id: row.try_get::<i64, _>("record_id")? as u64,
                text_a: row.try_get("text_a")?,
                text_b: row.try_get("text_b")?,
            })
        })
        .collect()
}

/// Run header, if the run exists
pub async fn load_run(pool: &SqlitePool, run_id: Uuid) -> AlignResult<Option<RunRow>> {
    let row = sqlx::query(
        r#"
        SELECT started_at, finished_at, articles, aligned, degraded, failed, records
        FROM alignment_runs WHERE run_id = ?
        "#,
    )
    .bind(run_id.to_string())
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    Ok(Some(RunRow {
        run_id,
        started_at: row.try_get("started_at")?,
        finished_at: row.try_get("finished_at")?,
        articles: row.try_get("articles")?,
        aligned: row.try_get("aligned")?,
        degraded: row.try_get("degraded")?,
        failed: row.try_get("failed")?,
        records: row.try_get("records")?,
    }))
}
