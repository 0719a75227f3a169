//! Gold denormalization shared by the publish and rebuild engines
//!
//! Joins one Silver event to its venue, genres and artists and writes the
//! precomputed display row into a physical Gold table. Both engines must
//! produce byte-identical rows for the same Silver state, so this is the
//! only place the join logic lives.

use beatline_common::{Error, Result};
use sqlx::SqliteConnection;

/// Write the denormalized row for one published event into `gold_table`
///
/// `INSERT OR REPLACE` keyed by the Silver id, so republishing a merged
/// event refreshes its Gold row in place.
pub async fn denormalize_event(
    conn: &mut SqliteConnection,
    gold_table: &str,
    event_id: &str,
) -> Result<()> {
    let row: Option<EventJoinRow> = sqlx::query_as(
        r#"
        SELECT e.id, e.venue_id, v.name AS venue_name, e.event_date,
               e.start_time, e.end_time, e.name, e.price_min, e.price_max,
               e.is_free, e.description, e.age_restriction, e.ticket_url,
               e.published_at
        FROM events e
        JOIN venues v ON v.id = e.venue_id
        WHERE e.id = ?
        "#,
    )
    .bind(event_id)
    .fetch_optional(&mut *conn)
    .await?;

    let row = row.ok_or_else(|| {
        Error::Internal(format!("Event {event_id} has no venue join for denormalization"))
    })?;

    // Alphabetical genre order is part of the read contract
    let genres: Vec<String> = sqlx::query_scalar(
        "SELECT g.name FROM event_genres eg
         JOIN genres g ON g.id = eg.genre_id
         WHERE eg.event_id = ?
         ORDER BY g.name",
    )
    .bind(event_id)
    .fetch_all(&mut *conn)
    .await?;

    // Artists keep lineup order (headliner first)
    let artists: Vec<String> = sqlx::query_scalar(
        "SELECT a.name FROM event_artists ea
         JOIN artists a ON a.id = ea.artist_id
         WHERE ea.event_id = ?
         ORDER BY ea.performance_order",
    )
    .bind(event_id)
    .fetch_all(&mut *conn)
    .await?;

    let genre_names = genres.join(", ");
    let artist_names = artists.join(", ");
    let search_text = format!(
        "{} {} {} {}",
        row.name,
        row.venue_name,
        genres.join(" "),
        artists.join(" ")
    )
    .to_lowercase();

    let sql = format!(
        r#"
        INSERT OR REPLACE INTO {gold_table} (
            id, venue_id, venue_name, event_date, start_time, end_time,
            name, price_min, price_max, is_free, description,
            age_restriction, ticket_url, genre_names, artist_names,
            genre_count, artist_count, search_text, published_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, COALESCE(?, CURRENT_TIMESTAMP))
        "#
    );

    sqlx::query(&sql)
        .bind(&row.id)
        .bind(&row.venue_id)
        .bind(&row.venue_name)
        .bind(&row.event_date)
        .bind(&row.start_time)
        .bind(&row.end_time)
        .bind(&row.name)
        .bind(row.price_min)
        .bind(row.price_max)
        .bind(row.is_free)
        .bind(&row.description)
        .bind(&row.age_restriction)
        .bind(&row.ticket_url)
        .bind(&genre_names)
        .bind(&artist_names)
        .bind(genres.len() as i64)
        .bind(artists.len() as i64)
        .bind(&search_text)
        .bind(&row.published_at)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Recompute both aggregate projections from current Gold contents
///
/// Wholesale DELETE + INSERT SELECT, never incremental patches; counts
/// cover future-dated rows only. Both projections read the Gold table, not
/// the Silver bridges, so the stats always agree with what readers see.
pub async fn recompute_stats(conn: &mut SqliteConnection, gold_table: &str) -> Result<()> {
    // Genre membership comes from the denormalized genre_names list. The
    // vocabulary is fixed and comma-free, so list containment by name is
    // exact.
    sqlx::query("DELETE FROM genre_stats").execute(&mut *conn).await?;
    sqlx::query(&format!(
        r#"
        INSERT INTO genre_stats (genre_id, genre_name, event_count)
        SELECT g.id, g.name, COUNT(*)
        FROM {gold_table} p
        JOIN genres g ON ', ' || p.genre_names || ', ' LIKE '%, ' || g.name || ', %'
        WHERE p.event_date >= date('now')
        GROUP BY g.id, g.name
        "#
    ))
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM venue_stats").execute(&mut *conn).await?;
    sqlx::query(&format!(
        r#"
        INSERT INTO venue_stats (venue_id, venue_name, event_count)
        SELECT p.venue_id, p.venue_name, COUNT(*)
        FROM {gold_table} p
        WHERE p.event_date >= date('now')
        GROUP BY p.venue_id, p.venue_name
        "#
    ))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
struct EventJoinRow {
    id: String,
    venue_id: String,
    venue_name: String,
    event_date: String,
    start_time: Option<String>,
    end_time: Option<String>,
    name: String,
    price_min: Option<f64>,
    price_max: Option<f64>,
    is_free: bool,
    description: Option<String>,
    age_restriction: Option<String>,
    ticket_url: Option<String>,
    published_at: Option<String>,
}
