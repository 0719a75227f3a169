//! Retention purge engine
//!
//! Deletes expired rows from both physical Gold tables. Silver and Bronze
//! keep full history, so any purge is replayable from the lower tiers. The
//! two deletes are separate statements: a crash between them can leave the
//! buffers transiently inconsistent, which the next rebuild repairs.

use beatline_common::db::settings::{GOLD_TABLE_A, GOLD_TABLE_B};
use beatline_common::{Error, Result};
use chrono::{Duration, Utc};
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use std::time::Instant;
use uuid::Uuid;

/// Whether a purge was scheduler-fired or manually triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PurgeType {
    Automated,
    Manual,
}

impl PurgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurgeType::Automated => "automated",
            PurgeType::Manual => "manual",
        }
    }
}

/// Result of one purge invocation
#[derive(Debug, Clone, Serialize)]
pub struct PurgeReport {
    pub threshold_date: String,
    pub rows_deleted: i64,
    pub duration_ms: i64,
    pub purge_type: PurgeType,
}

/// Delete all Gold rows older than `today - retention_days`
pub async fn run_purge(
    db: &Pool<Sqlite>,
    retention_days: i64,
    purge_type: PurgeType,
) -> Result<PurgeReport> {
    if retention_days < 0 {
        return Err(Error::InvalidInput(format!(
            "retention_days must be non-negative, got {retention_days}"
        )));
    }

    let started = Instant::now();
    let threshold = (Utc::now().date_naive() - Duration::days(retention_days))
        .format("%Y-%m-%d")
        .to_string();

    let mut rows_deleted = 0i64;
    for table in [GOLD_TABLE_A, GOLD_TABLE_B] {
        let affected = sqlx::query(&format!("DELETE FROM {table} WHERE event_date < ?"))
            .bind(&threshold)
            .execute(db)
            .await?
            .rows_affected() as i64;

        tracing::debug!(table, affected, "Purged expired gold rows");
        rows_deleted += affected;
    }

    let duration_ms = started.elapsed().as_millis() as i64;

    sqlx::query(
        "INSERT INTO purge_log (id, threshold_date, rows_deleted, duration_ms, purge_type)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&threshold)
    .bind(rows_deleted)
    .bind(duration_ms)
    .bind(purge_type.as_str())
    .execute(db)
    .await?;

    tracing::info!(
        threshold = %threshold,
        rows_deleted,
        purge_type = purge_type.as_str(),
        "Purge completed"
    );

    Ok(PurgeReport {
        threshold_date: threshold,
        rows_deleted,
        duration_ms,
        purge_type,
    })
}
