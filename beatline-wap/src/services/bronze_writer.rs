//! Bronze capture writer
//!
//! Append-only entry point for every producer input. No validation happens
//! here: any payload the producer hands over is stored verbatim so later
//! tiers can always be replayed from the raw record.

use beatline_common::db::SourceType;
use beatline_common::Result;
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

/// Append a raw producer payload to the Bronze capture log
///
/// Returns the capture id. The row is never updated or deleted.
pub async fn append(
    db: &Pool<Sqlite>,
    source_type: SourceType,
    payload: &serde_json::Value,
    provenance: Option<&serde_json::Value>,
) -> Result<String> {
    let id = Uuid::new_v4().to_string();

    sqlx::query(
        "INSERT INTO bronze_captures (id, source_type, raw_payload, provenance) VALUES (?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(source_type.as_str())
    .bind(payload.to_string())
    .bind(provenance.map(|p| p.to_string()))
    .execute(db)
    .await?;

    tracing::debug!(capture_id = %id, source = %source_type, "Appended bronze capture");

    Ok(id)
}
