//! Operational pipeline log
//!
//! Append-only record of every pipeline invocation. The pipeline itself
//! never reads it back; it exists for external monitoring and operators.

use beatline_common::Result;
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

/// Outcome of one pipeline invocation
#[derive(Debug, Clone, Default)]
pub struct OpOutcome {
    pub batch_size: Option<i64>,
    pub processed: i64,
    pub published: i64,
    pub quarantined: i64,
    pub errors: i64,
    pub summary: Option<String>,
    pub duration_ms: i64,
    pub success: bool,
}

/// Append one entry to the pipeline log
pub async fn record(db: &Pool<Sqlite>, procedure: &str, outcome: &OpOutcome) -> Result<()> {
    let status = if outcome.success { "success" } else { "failed" };

    sqlx::query(
        r#"
        INSERT INTO pipeline_log (
            id, procedure, batch_size, processed_count, published_count,
            quarantined_count, error_count, error_summary, duration_ms, status
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(procedure)
    .bind(outcome.batch_size)
    .bind(outcome.processed)
    .bind(outcome.published)
    .bind(outcome.quarantined)
    .bind(outcome.errors)
    .bind(&outcome.summary)
    .bind(outcome.duration_ms)
    .bind(status)
    .execute(db)
    .await?;

    Ok(())
}
