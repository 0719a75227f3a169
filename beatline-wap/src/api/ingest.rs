//! Ingestion trigger endpoints
//!
//! Producers (scrapers, the submission form backend, admin tooling) hand
//! candidate batches to the pipeline here. The batch is captured to Bronze
//! unconditionally, then upserted into Silver.

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use beatline_common::db::SourceType;
use serde::Deserialize;

use crate::services::upsert_engine::{self, EventCandidate, IngestReport};
use crate::{ApiError, ApiResult, AppState};

/// Ingestion request body
#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub events: Vec<EventCandidate>,
    /// Producer-supplied provenance metadata, stored verbatim in Bronze
    #[serde(default)]
    pub provenance: Option<serde_json::Value>,
}

/// POST /api/ingest/{source_type}
///
/// Runs ingestion for one producer batch. Per-candidate failures are
/// reported in the response, not as an HTTP error.
pub async fn run_ingestion(
    State(state): State<AppState>,
    Path(source_type): Path<String>,
    Json(request): Json<IngestRequest>,
) -> ApiResult<Json<IngestReport>> {
    let source_type: SourceType = source_type
        .parse()
        .map_err(|e: beatline_common::Error| ApiError::BadRequest(e.to_string()))?;

    if request.events.is_empty() {
        return Err(ApiError::BadRequest("Empty event batch".to_string()));
    }

    let report = upsert_engine::ingest_batch(
        &state.db,
        source_type,
        &request.events,
        request.provenance.as_ref(),
    )
    .await?;

    Ok(Json(report))
}

/// POST /api/ingest/replay/{capture_id}
///
/// Re-runs a stored Bronze capture through the Silver upsert. No new Bronze
/// row is written; the original capture stays the record of truth.
pub async fn run_replay(
    State(state): State<AppState>,
    Path(capture_id): Path<String>,
) -> ApiResult<Json<IngestReport>> {
    let report = upsert_engine::replay_capture(&state.db, &capture_id).await?;
    Ok(Json(report))
}

/// Build ingestion routes
pub fn ingest_routes() -> Router<AppState> {
    Router::new()
        .route("/api/ingest/replay/:capture_id", post(run_replay))
        .route("/api/ingest/:source_type", post(run_ingestion))
}
