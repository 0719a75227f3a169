//! Idempotent Silver upsert engine
//!
//! Computes a content fingerprint over the identity fields (venue, date,
//! start time) and writes or merges the candidate into the canonical events
//! table in a single storage statement. Concurrent writers racing on the
//! same fingerprint serialize at the unique index: one wins the insert, the
//! rest merge into the existing row.

use beatline_common::db::{settings, SourceType};
use beatline_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::services::denormalizer;

/// A structured event candidate handed over by a producer
///
/// Identity fields are optional on purpose: a structurally broken candidate
/// still lands in Silver where the audit engine flags it as a hard error,
/// instead of silently vanishing at ingest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventCandidate {
    pub venue_id: Option<String>,
    pub event_date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub name: Option<String>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    #[serde(default)]
    pub is_free: bool,
    pub description: Option<String>,
    pub age_restriction: Option<String>,
    pub ticket_url: Option<String>,
    pub source_id: Option<String>,
    #[serde(default)]
    pub genre_ids: Vec<String>,
    #[serde(default)]
    pub artist_ids: Vec<String>,
}

/// Result of ingesting one producer batch
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub bronze_id: String,
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    pub failures: Vec<String>,
}

/// Compute the deduplication fingerprint for an event
///
/// Two distinct events sharing venue + date + start time collapse into one
/// canonical record; that is the dedup policy, not an accident. Components
/// are NUL-delimited so values containing a separator cannot shift content
/// between fields and collide.
pub fn fingerprint(venue_id: &str, event_date: &str, start_time: &str) -> String {
    let input = format!("{venue_id}\0{event_date}\0{start_time}");
    let digest = Sha256::digest(input.as_bytes());
    format!("{digest:x}")
}

fn candidate_fingerprint(candidate: &EventCandidate) -> String {
    fingerprint(
        candidate.venue_id.as_deref().unwrap_or(""),
        candidate.event_date.as_deref().unwrap_or(""),
        candidate.start_time.as_deref().unwrap_or(""),
    )
}

/// Insert or merge one candidate into the Silver events table
///
/// Returns `(event_id, is_new)`. The statement is atomic: on fingerprint
/// conflict all mutable descriptive fields are overwritten, `revision` is
/// bumped and `updated_at` touched, while id and status are preserved.
pub async fn upsert_event(
    db: &Pool<Sqlite>,
    candidate: &EventCandidate,
    source_type: SourceType,
) -> Result<(String, bool)> {
    let id = Uuid::new_v4().to_string();
    let fp = candidate_fingerprint(candidate);

    let (event_id, revision, status): (String, i64, String) = sqlx::query_as(
        r#"
        INSERT INTO events (
            id, fingerprint, venue_id, event_date, start_time, end_time,
            name, price_min, price_max, is_free, description,
            age_restriction, ticket_url, source_type, source_id
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(fingerprint) DO UPDATE SET
            end_time = excluded.end_time,
            name = excluded.name,
            price_min = excluded.price_min,
            price_max = excluded.price_max,
            is_free = excluded.is_free,
            description = excluded.description,
            age_restriction = excluded.age_restriction,
            ticket_url = excluded.ticket_url,
            source_type = excluded.source_type,
            source_id = excluded.source_id,
            revision = revision + 1,
            updated_at = CURRENT_TIMESTAMP
        RETURNING id, revision, status
        "#,
    )
    .bind(&id)
    .bind(&fp)
    .bind(&candidate.venue_id)
    .bind(&candidate.event_date)
    .bind(&candidate.start_time)
    .bind(&candidate.end_time)
    .bind(&candidate.name)
    .bind(candidate.price_min)
    .bind(candidate.price_max)
    .bind(candidate.is_free)
    .bind(&candidate.description)
    .bind(candidate.age_restriction.as_deref().unwrap_or("all_ages"))
    .bind(&candidate.ticket_url)
    .bind(source_type.as_str())
    .bind(&candidate.source_id)
    .fetch_one(db)
    .await?;

    let is_new = revision == 0;

    // Replace bridge rows so the latest submission owns the lineup
    sync_genres(db, &event_id, &candidate.genre_ids).await?;
    sync_artists(db, &event_id, &candidate.artist_ids).await?;

    // A merge into an already-published row must reach readers immediately:
    // refresh the active Gold row and the aggregates so they never disagree
    // with Silver until the next publish run.
    if status == "published" {
        let active = settings::get_active_gold_table(db).await?;
        let mut conn = db.acquire().await?;
        denormalizer::denormalize_event(&mut conn, active, &event_id).await?;
        denormalizer::recompute_stats(&mut conn, active).await?;
    }

    tracing::debug!(
        event_id = %event_id,
        is_new,
        name = candidate.name.as_deref().unwrap_or("<unnamed>"),
        "Upserted event"
    );

    Ok((event_id, is_new))
}

/// Replace event-genre relationships; the first genre is primary
async fn sync_genres(db: &Pool<Sqlite>, event_id: &str, genre_ids: &[String]) -> Result<()> {
    if genre_ids.is_empty() {
        return Ok(());
    }

    sqlx::query("DELETE FROM event_genres WHERE event_id = ?")
        .bind(event_id)
        .execute(db)
        .await?;

    for (idx, genre_id) in genre_ids.iter().enumerate() {
        sqlx::query(
            "INSERT OR IGNORE INTO event_genres (event_id, genre_id, is_primary) VALUES (?, ?, ?)",
        )
        .bind(event_id)
        .bind(genre_id)
        .bind(idx == 0)
        .execute(db)
        .await?;
    }

    Ok(())
}

/// Replace event-artist relationships; the first artist is the headliner
async fn sync_artists(db: &Pool<Sqlite>, event_id: &str, artist_ids: &[String]) -> Result<()> {
    if artist_ids.is_empty() {
        return Ok(());
    }

    sqlx::query("DELETE FROM event_artists WHERE event_id = ?")
        .bind(event_id)
        .execute(db)
        .await?;

    for (idx, artist_id) in artist_ids.iter().enumerate() {
        sqlx::query(
            "INSERT OR IGNORE INTO event_artists (event_id, artist_id, performance_order, is_headliner)
             VALUES (?, ?, ?, ?)",
        )
        .bind(event_id)
        .bind(artist_id)
        .bind((idx + 1) as i64)
        .bind(idx == 0)
        .execute(db)
        .await?;
    }

    Ok(())
}

/// Ingest one producer batch: Bronze append first, then per-candidate upsert
///
/// A malformed candidate fails its own upsert atomically and is reported in
/// the result without aborting the rest of the batch.
pub async fn ingest_batch(
    db: &Pool<Sqlite>,
    source_type: SourceType,
    candidates: &[EventCandidate],
    provenance: Option<&serde_json::Value>,
) -> Result<IngestReport> {
    let payload = serde_json::to_value(candidates)
        .map_err(|e| beatline_common::Error::Internal(format!("Payload serialization: {e}")))?;

    let bronze_id =
        crate::services::bronze_writer::append(db, source_type, &payload, provenance).await?;

    let report = upsert_all(db, source_type, candidates, bronze_id).await?;

    tracing::info!(
        source = %source_type,
        processed = report.processed,
        created = report.created,
        updated = report.updated,
        failed = report.failed,
        "Ingested batch"
    );

    Ok(report)
}

/// Re-run a stored Bronze capture through the Silver upsert
///
/// Replays the capture's candidate batch without appending a new Bronze row;
/// the original capture remains the sole record of the input.
pub async fn replay_capture(db: &Pool<Sqlite>, capture_id: &str) -> Result<IngestReport> {
    let row: Option<(String, String)> =
        sqlx::query_as("SELECT source_type, raw_payload FROM bronze_captures WHERE id = ?")
            .bind(capture_id)
            .fetch_optional(db)
            .await?;

    let (source_type, payload) =
        row.ok_or_else(|| Error::NotFound(format!("Bronze capture {capture_id}")))?;
    let source_type: SourceType = source_type.parse()?;

    let candidates: Vec<EventCandidate> = serde_json::from_str(&payload).map_err(|e| {
        Error::InvalidInput(format!(
            "Capture {capture_id} payload is not a candidate batch: {e}"
        ))
    })?;

    let report = upsert_all(db, source_type, &candidates, capture_id.to_string()).await?;

    tracing::info!(
        capture_id,
        processed = report.processed,
        created = report.created,
        updated = report.updated,
        failed = report.failed,
        "Replayed bronze capture"
    );

    Ok(report)
}

async fn upsert_all(
    db: &Pool<Sqlite>,
    source_type: SourceType,
    candidates: &[EventCandidate],
    bronze_id: String,
) -> Result<IngestReport> {
    let mut created = 0;
    let mut updated = 0;
    let mut failures = Vec::new();

    for candidate in candidates {
        match upsert_event(db, candidate, source_type).await {
            Ok((_, true)) => created += 1,
            Ok((_, false)) => updated += 1,
            Err(e) => {
                let label = candidate.name.as_deref().unwrap_or("<unnamed>");
                tracing::warn!(name = label, error = %e, "Candidate upsert failed");
                failures.push(format!("{label}: {e}"));
            }
        }
    }

    Ok(IngestReport {
        bronze_id,
        processed: candidates.len(),
        created,
        updated,
        failed: failures.len(),
        failures,
    })
}
