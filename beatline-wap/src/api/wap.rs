//! WAP workflow trigger endpoints: audit, publish, rebuild, purge

use axum::{extract::State, routing::post, Json, Router};
use beatline_common::db::settings;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::services::audit_engine;
use crate::services::publish_engine;
use crate::services::purge_engine::{self, PurgeType};
use crate::services::rebuild_engine;
use crate::{ApiResult, AppState};

/// Publish request body
#[derive(Debug, Default, Deserialize)]
pub struct PublishRequest {
    /// Cap on rows promoted by this invocation; defaults to the configured
    /// publish batch size
    pub batch_size: Option<i64>,
}

/// Manual purge request body
#[derive(Debug, Deserialize)]
pub struct PurgeRequest {
    /// Explicit day threshold for this purge
    pub retention_days: i64,
}

/// POST /api/wap/audit
///
/// Standalone audit pass: quarantines defective pending rows, reports hard
/// errors without touching them.
pub async fn run_audit(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let report = audit_engine::run_audit_standalone(&state.db).await?;

    Ok(Json(json!({
        "status": if report.passed() { "success" } else { "failed" },
        "audit_passed": report.passed(),
        "processed": report.processed,
        "quarantined": report.quarantined,
        "hard_errors": report.hard_errors,
        "summary": report.summary,
    })))
}

/// POST /api/wap/publish
///
/// Full audit + publish workflow in one transaction. A hard-error abort
/// surfaces as 409 with the audit summary; nothing is promoted.
pub async fn run_publish(
    State(state): State<AppState>,
    request: Option<Json<PublishRequest>>,
) -> ApiResult<Json<Value>> {
    let requested = request.and_then(|Json(r)| r.batch_size);
    let batch_size = match requested {
        Some(b) => b,
        None => settings::get_publish_batch_size(&state.db).await?,
    };

    let report = publish_engine::run_publish(&state.db, batch_size).await?;

    Ok(Json(json!({
        "status": "success",
        "published": report.published,
        "quarantined": report.audit.quarantined,
        "batch_size": report.batch_size,
        "duration_ms": report.duration_ms,
        "summary": report.audit.summary,
    })))
}

/// POST /api/wap/rebuild
///
/// Manual trigger for the Gold shadow rebuild.
pub async fn run_rebuild(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let report = rebuild_engine::run_rebuild(&state.db).await?;

    Ok(Json(json!({
        "status": "success",
        "active_table": report.active_table,
        "rows_built": report.rows_built,
        "retention_days": report.retention_days,
        "duration_ms": report.duration_ms,
    })))
}

/// POST /api/wap/purge
///
/// Manual purge with an explicit day threshold.
pub async fn run_purge(
    State(state): State<AppState>,
    Json(request): Json<PurgeRequest>,
) -> ApiResult<Json<Value>> {
    let report =
        purge_engine::run_purge(&state.db, request.retention_days, PurgeType::Manual).await?;

    Ok(Json(json!({
        "status": "success",
        "threshold_date": report.threshold_date,
        "rows_deleted": report.rows_deleted,
        "duration_ms": report.duration_ms,
    })))
}

/// Build WAP workflow routes
pub fn wap_routes() -> Router<AppState> {
    Router::new()
        .route("/api/wap/audit", post(run_audit))
        .route("/api/wap/publish", post(run_publish))
        .route("/api/wap/rebuild", post(run_rebuild))
        .route("/api/wap/purge", post(run_purge))
}
