//! Gold rebuild / shadow-swap engine
//!
//! Rebuilds the public read store from the full Silver history into the
//! inactive Gold buffer, then flips the read pointer. Readers never observe
//! a partially built table: the pointer changes only after the build
//! transaction commits. A failed build leaves the pointer and the active
//! table untouched.

use beatline_common::db::settings;
use beatline_common::Result;
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use std::time::Instant;

use crate::services::denormalizer;
use crate::services::ops_log::{self, OpOutcome};

/// Result of one rebuild invocation
#[derive(Debug, Clone, Serialize)]
pub struct RebuildReport {
    /// The freshly built table now serving reads
    pub active_table: String,
    pub rows_built: i64,
    pub retention_days: i64,
    pub duration_ms: i64,
}

/// Rebuild the inactive Gold buffer and swap the read pointer to it
///
/// Two rebuilds must not run concurrently; the caller (scheduler or a
/// deployment-level lock) serializes invocations.
pub async fn run_rebuild(db: &Pool<Sqlite>) -> Result<RebuildReport> {
    let started = Instant::now();

    match rebuild_inner(db).await {
        Ok(report) => {
            ops_log::record(
                db,
                "rebuild",
                &OpOutcome {
                    processed: report.rows_built,
                    published: report.rows_built,
                    summary: Some(format!("rebuilt into {}", report.active_table)),
                    duration_ms: report.duration_ms,
                    success: true,
                    ..Default::default()
                },
            )
            .await?;

            tracing::info!(
                table = %report.active_table,
                rows = report.rows_built,
                "Gold rebuild completed, pointer swapped"
            );

            Ok(report)
        }
        Err(e) => {
            tracing::error!(error = %e, "Gold rebuild failed, pointer unchanged");

            // The original failure is the one callers must see, even if the
            // log insert itself fails
            if let Err(log_err) = ops_log::record(
                db,
                "rebuild",
                &OpOutcome {
                    errors: 1,
                    summary: Some(e.to_string()),
                    duration_ms: started.elapsed().as_millis() as i64,
                    success: false,
                    ..Default::default()
                },
            )
            .await
            {
                tracing::error!(error = %log_err, "Failed to record rebuild failure");
            }

            Err(e)
        }
    }
}

async fn rebuild_inner(db: &Pool<Sqlite>) -> Result<RebuildReport> {
    let started = Instant::now();

    let active = settings::get_active_gold_table(db).await?;
    let target = settings::inactive_gold_table(active);
    let retention_days = settings::get_retention_days(db).await?;

    tracing::info!(active, target, retention_days, "Starting Gold rebuild");

    // Build phase: everything lands in the inactive buffer
    let mut tx = db.begin().await?;

    sqlx::query(&format!("DELETE FROM {target}")).execute(&mut *tx).await?;

    let ids: Vec<String> = sqlx::query_scalar(
        "SELECT id FROM events
         WHERE status = 'published'
           AND venue_id IN (SELECT id FROM venues)
           AND event_date >= date('now', ?)
         ORDER BY event_date, start_time",
    )
    .bind(format!("-{retention_days} days"))
    .fetch_all(&mut *tx)
    .await?;

    for id in &ids {
        denormalizer::denormalize_event(&mut tx, target, id).await?;
    }

    denormalizer::recompute_stats(&mut tx, target).await?;

    tx.commit().await?;

    // Swap phase: single-row pointer flip, no blind swap on build failure
    settings::set_active_gold_table(db, target).await?;

    Ok(RebuildReport {
        active_table: target.to_string(),
        rows_built: ids.len() as i64,
        retention_days,
        duration_ms: started.elapsed().as_millis() as i64,
    })
}
