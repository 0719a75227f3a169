//! Publish/promotion engine
//!
//! One transaction covering the whole Write-Audit-Publish step: audit the
//! pending set, abort on hard errors, promote a capped batch to published,
//! denormalize into the active Gold table, and recompute the aggregate
//! projections. Any failure rolls the entire transaction back.

use beatline_common::db::settings;
use beatline_common::{Error, Result};
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use std::time::Instant;

use crate::services::audit_engine::{self, AuditReport};
use crate::services::denormalizer;
use crate::services::ops_log::{self, OpOutcome};

/// Result of one publish invocation
#[derive(Debug, Clone, Serialize)]
pub struct PublishReport {
    pub audit: AuditReport,
    pub published: i64,
    pub batch_size: i64,
    pub duration_ms: i64,
}

/// Run the full audit + publish workflow
///
/// `batch_size` caps how much pending backlog one invocation drains; it is
/// a backpressure knob, not a limit on total backlog. Concurrent publish
/// invocations are not mutually excluded here; deployments must serialize
/// them externally.
pub async fn run_publish(db: &Pool<Sqlite>, batch_size: i64) -> Result<PublishReport> {
    let started = Instant::now();

    match publish_inner(db, batch_size).await {
        Ok((audit, published)) => {
            let duration_ms = started.elapsed().as_millis() as i64;

            ops_log::record(
                db,
                "publish",
                &OpOutcome {
                    batch_size: Some(batch_size),
                    processed: audit.processed,
                    published,
                    quarantined: audit.quarantined,
                    errors: 0,
                    summary: (!audit.summary.is_empty()).then(|| audit.summary.clone()),
                    duration_ms,
                    success: true,
                },
            )
            .await?;

            tracing::info!(published, quarantined = audit.quarantined, "Publish completed");

            Ok(PublishReport {
                audit,
                published,
                batch_size,
                duration_ms,
            })
        }
        Err(e) => {
            let duration_ms = started.elapsed().as_millis() as i64;
            tracing::error!(error = %e, "Publish failed, transaction rolled back");

            // The original failure is the one callers must see, even if the
            // log insert itself fails
            if let Err(log_err) = ops_log::record(
                db,
                "publish",
                &OpOutcome {
                    batch_size: Some(batch_size),
                    errors: 1,
                    summary: Some(e.to_string()),
                    duration_ms,
                    success: false,
                    ..Default::default()
                },
            )
            .await
            {
                tracing::error!(error = %log_err, "Failed to record publish failure");
            }

            Err(e)
        }
    }
}

/// The transactional body: everything here commits or rolls back as a unit
async fn publish_inner(db: &Pool<Sqlite>, batch_size: i64) -> Result<(AuditReport, i64)> {
    if batch_size <= 0 {
        return Err(Error::InvalidInput(format!(
            "batch_size must be positive, got {batch_size}"
        )));
    }

    let mut tx = db.begin().await?;

    // Audit effects join this transaction; a rollback undoes them too
    let audit = audit_engine::run_audit(&mut tx).await?;

    if !audit.passed() {
        tx.rollback().await?;
        return Err(Error::AuditBlocked(format!(
            "{} hard error(s) block the publish batch: {}",
            audit.hard_errors, audit.summary
        )));
    }

    let active = settings::get_active_gold_table(&mut *tx).await?;

    // Promote the oldest eligible rows first
    let ids: Vec<String> = sqlx::query_scalar(
        "SELECT id FROM events
         WHERE status = 'pending'
           AND venue_id IN (SELECT id FROM venues)
           AND event_date >= date('now')
         ORDER BY event_date, start_time
         LIMIT ?",
    )
    .bind(batch_size)
    .fetch_all(&mut *tx)
    .await?;

    for id in &ids {
        sqlx::query(
            "UPDATE events
             SET status = 'published', published_at = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP
             WHERE id = ?",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        denormalizer::denormalize_event(&mut tx, active, id).await?;
    }

    denormalizer::recompute_stats(&mut tx, active).await?;

    tx.commit().await?;

    Ok((audit, ids.len() as i64))
}
