//! Operator endpoints: pipeline metrics and log browsing
//!
//! Read-only views over the operational log tables; the pipeline itself
//! never consumes these.

use axum::{extract::State, routing::get, Json, Router};
use beatline_common::db::models::{PipelineLogEntry, PurgeLogEntry};
use beatline_common::db::settings;
use serde_json::{json, Value};

use crate::{ApiResult, AppState};

/// GET /api/metrics
///
/// Silver counts by status plus the current Gold row count.
pub async fn metrics(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM events GROUP BY status")
            .fetch_all(&state.db)
            .await
            .map_err(beatline_common::Error::from)?;

    let mut by_status = serde_json::Map::new();
    for status in ["pending", "published", "quarantined", "rejected"] {
        let count = rows
            .iter()
            .find(|(s, _)| s == status)
            .map(|(_, c)| *c)
            .unwrap_or(0);
        by_status.insert(status.to_string(), json!(count));
    }

    let active = settings::get_active_gold_table(&state.db).await?;
    let gold_count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {active}"))
        .fetch_one(&state.db)
        .await
        .map_err(beatline_common::Error::from)?;

    let bronze_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bronze_captures")
        .fetch_one(&state.db)
        .await
        .map_err(beatline_common::Error::from)?;

    Ok(Json(json!({
        "silver": by_status,
        "gold": { "active_table": active, "events": gold_count },
        "bronze": { "captures": bronze_count },
    })))
}

/// GET /api/scheduler/jobs
///
/// Current recurring-job configuration as read from settings.
pub async fn scheduler_jobs(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let enabled = settings::get_scheduler_enabled(&state.db).await?;
    let interval_minutes = settings::get_publish_interval_minutes(&state.db).await?;
    let batch_size = settings::get_publish_batch_size(&state.db).await?;
    let rebuild_hour = settings::get_rebuild_hour(&state.db).await?;
    let purge_hour = settings::get_purge_hour(&state.db).await?;
    let retention_days = settings::get_retention_days(&state.db).await?;

    Ok(Json(json!({
        "enabled": enabled,
        "jobs": [
            {
                "name": "auto_publish",
                "interval_minutes": interval_minutes,
                "batch_size": batch_size,
            },
            {
                "name": "gold_rebuild",
                "hour": rebuild_hour,
            },
            {
                "name": "retention_purge",
                "hour": purge_hour,
                "retention_days": retention_days,
            },
        ],
    })))
}

/// GET /api/log/pipeline
///
/// Most recent pipeline invocations, newest first.
pub async fn pipeline_log(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<PipelineLogEntry>>> {
    let entries: Vec<PipelineLogEntry> = sqlx::query_as(
        "SELECT id, procedure, batch_size, processed_count, published_count,
                quarantined_count, error_count, error_summary, duration_ms,
                status, created_at
         FROM pipeline_log
         ORDER BY created_at DESC, id
         LIMIT 100",
    )
    .fetch_all(&state.db)
    .await
    .map_err(beatline_common::Error::from)?;

    Ok(Json(entries))
}

/// GET /api/log/purges
///
/// Most recent purges, newest first.
pub async fn purge_log(State(state): State<AppState>) -> ApiResult<Json<Vec<PurgeLogEntry>>> {
    let entries: Vec<PurgeLogEntry> = sqlx::query_as(
        "SELECT id, threshold_date, rows_deleted, duration_ms, purge_type, created_at
         FROM purge_log
         ORDER BY created_at DESC, id
         LIMIT 100",
    )
    .fetch_all(&state.db)
    .await
    .map_err(beatline_common::Error::from)?;

    Ok(Json(entries))
}

/// Build operator log routes
pub fn log_routes() -> Router<AppState> {
    Router::new()
        .route("/api/metrics", get(metrics))
        .route("/api/scheduler/jobs", get(scheduler_jobs))
        .route("/api/log/pipeline", get(pipeline_log))
        .route("/api/log/purges", get(purge_log))
}
