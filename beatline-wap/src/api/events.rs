//! Public read surface: published event listing and aggregate stats
//!
//! Every query resolves the Gold pointer first, so reads ride out a
//! concurrent rebuild without ever seeing a half-built table.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use beatline_common::db::models::{AggregateStat, Genre, PublishedEvent, Venue};
use beatline_common::db::settings;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{ApiResult, AppState};

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 500;

/// Listing query parameters
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /api/events
///
/// Ordered listing (date, then start time) of published events within the
/// retention window.
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Value>> {
    let active = settings::get_active_gold_table(&state.db).await?;
    let retention_days = settings::get_retention_days(&state.db).await?;

    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = query.offset.unwrap_or(0).max(0);

    let sql = format!(
        "SELECT * FROM {active}
         WHERE event_date >= date('now', ?)
         ORDER BY event_date, start_time
         LIMIT ? OFFSET ?"
    );

    let events: Vec<PublishedEvent> = sqlx::query_as(&sql)
        .bind(format!("-{retention_days} days"))
        .bind(limit)
        .bind(offset)
        .fetch_all(&state.db)
        .await
        .map_err(beatline_common::Error::from)?;

    Ok(Json(json!({
        "count": events.len(),
        "events": events,
    })))
}

/// GET /api/stats/genres
///
/// Per-genre counts of currently published, future-dated events.
pub async fn genre_stats(State(state): State<AppState>) -> ApiResult<Json<Vec<AggregateStat>>> {
    let stats: Vec<AggregateStat> = sqlx::query_as(
        "SELECT genre_id AS id, genre_name AS name, event_count
         FROM genre_stats
         ORDER BY event_count DESC, name",
    )
    .fetch_all(&state.db)
    .await
    .map_err(beatline_common::Error::from)?;

    Ok(Json(stats))
}

/// GET /api/stats/venues
///
/// Per-venue counts of currently published, future-dated events.
pub async fn venue_stats(State(state): State<AppState>) -> ApiResult<Json<Vec<AggregateStat>>> {
    let stats: Vec<AggregateStat> = sqlx::query_as(
        "SELECT venue_id AS id, venue_name AS name, event_count
         FROM venue_stats
         ORDER BY event_count DESC, name",
    )
    .fetch_all(&state.db)
    .await
    .map_err(beatline_common::Error::from)?;

    Ok(Json(stats))
}

/// GET /api/genres
///
/// The fixed genre vocabulary; producers need these ids for ingestion.
pub async fn list_genres(State(state): State<AppState>) -> ApiResult<Json<Vec<Genre>>> {
    let genres: Vec<Genre> = sqlx::query_as("SELECT id, name, slug FROM genres ORDER BY name")
        .fetch_all(&state.db)
        .await
        .map_err(beatline_common::Error::from)?;

    Ok(Json(genres))
}

/// GET /api/venues
///
/// Known venues; events referencing anything else are quarantined as
/// orphaned.
pub async fn list_venues(State(state): State<AppState>) -> ApiResult<Json<Vec<Venue>>> {
    let venues: Vec<Venue> =
        sqlx::query_as("SELECT id, name, slug, address, city FROM venues ORDER BY name")
            .fetch_all(&state.db)
            .await
            .map_err(beatline_common::Error::from)?;

    Ok(Json(venues))
}

/// Build public read routes
pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/api/events", get(list_events))
        .route("/api/genres", get(list_genres))
        .route("/api/venues", get(list_venues))
        .route("/api/stats/genres", get(genre_stats))
        .route("/api/stats/venues", get(venue_stats))
}
