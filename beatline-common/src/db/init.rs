//! Database initialization
//!
//! Creates the SQLite database on first run with the full three-tier schema:
//! Bronze capture log, Silver canonical store with dimensions and bridges,
//! and the double-buffered Gold read tables, plus operational bookkeeping.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL mode allows concurrent readers while the pipeline writes
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    // Set busy timeout so racing upserts wait instead of erroring
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    // Schema creation (idempotent - safe to call multiple times)
    create_settings_table(&pool).await?;
    create_bronze_captures_table(&pool).await?;
    create_venues_table(&pool).await?;
    create_artists_table(&pool).await?;
    create_genres_table(&pool).await?;
    create_events_table(&pool).await?;
    create_event_genres_table(&pool).await?;
    create_event_artists_table(&pool).await?;

    // Gold tier: two identical physical tables behind a settings pointer
    create_published_events_table(&pool, "published_events_a").await?;
    create_published_events_table(&pool, "published_events_b").await?;
    create_stats_tables(&pool).await?;

    // Operational bookkeeping
    create_pipeline_log_table(&pool).await?;
    create_purge_log_table(&pool).await?;

    init_default_settings(&pool).await?;

    Ok(pool)
}

/// Create the settings table
///
/// Stores pipeline configuration key-value pairs, including the Gold
/// active-table pointer.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the Bronze capture table
///
/// Append-only log of every producer input. The pipeline never updates or
/// deletes rows here; replay of any later tier starts from this table.
pub async fn create_bronze_captures_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bronze_captures (
            id TEXT PRIMARY KEY,
            source_type TEXT NOT NULL CHECK (source_type IN ('scraper', 'user_submission', 'admin_edit')),
            captured_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            raw_payload TEXT NOT NULL,
            provenance TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_bronze_captures_source ON bronze_captures(source_type, captured_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the venues dimension table
pub async fn create_venues_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS venues (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            address TEXT,
            city TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_venues_slug ON venues(slug)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the artists dimension table
pub async fn create_artists_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS artists (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_artists_slug ON artists(slug)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the genres dimension table and seed the controlled vocabulary
pub async fn create_genres_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS genres (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Fixed controlled vocabulary; ids are stable across installations
    let vocabulary = [
        ("c5b10d6e-0000-4000-8000-000000000001", "Techno", "techno"),
        ("c5b10d6e-0000-4000-8000-000000000002", "House", "house"),
        ("c5b10d6e-0000-4000-8000-000000000003", "Drum & Bass", "drum-and-bass"),
        ("c5b10d6e-0000-4000-8000-000000000004", "Trance", "trance"),
        ("c5b10d6e-0000-4000-8000-000000000005", "Dubstep", "dubstep"),
        ("c5b10d6e-0000-4000-8000-000000000006", "Ambient", "ambient"),
        ("c5b10d6e-0000-4000-8000-000000000007", "Electro", "electro"),
        ("c5b10d6e-0000-4000-8000-000000000008", "Hardcore", "hardcore"),
        ("c5b10d6e-0000-4000-8000-000000000009", "UK Garage", "uk-garage"),
        ("c5b10d6e-0000-4000-8000-00000000000a", "Experimental", "experimental"),
    ];

    for (id, name, slug) in vocabulary {
        sqlx::query("INSERT OR IGNORE INTO genres (id, name, slug) VALUES (?, ?, ?)")
            .bind(id)
            .bind(name)
            .bind(slug)
            .execute(pool)
            .await?;
    }

    Ok(())
}

/// Create the Silver canonical events table
///
/// One row per fingerprint. venue_id, event_date and name are intentionally
/// nullable: structurally broken rows must be storable so the audit engine
/// can flag them as hard errors rather than losing them at ingest.
pub async fn create_events_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS events (
            id TEXT PRIMARY KEY,
            fingerprint TEXT NOT NULL UNIQUE,
            venue_id TEXT,
            event_date TEXT,
            start_time TEXT,
            end_time TEXT,
            name TEXT,
            price_min REAL,
            price_max REAL,
            is_free INTEGER NOT NULL DEFAULT 0,
            description TEXT,
            age_restriction TEXT NOT NULL DEFAULT 'all_ages',
            ticket_url TEXT,
            source_type TEXT NOT NULL CHECK (source_type IN ('scraper', 'user_submission', 'admin_edit')),
            source_id TEXT,
            status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'published', 'quarantined', 'rejected')),
            rejection_reason TEXT,
            revision INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            published_at TIMESTAMP,
            CHECK (price_min IS NULL OR price_min >= 0),
            CHECK (price_max IS NULL OR price_max >= 0),
            CHECK (revision >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_status ON events(status)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_date ON events(event_date)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_venue ON events(venue_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the event-genre bridge table
pub async fn create_event_genres_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS event_genres (
            event_id TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
            genre_id TEXT NOT NULL REFERENCES genres(id) ON DELETE CASCADE,
            is_primary INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (event_id, genre_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_event_genres_genre ON event_genres(genre_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the event-artist bridge table (lineup)
pub async fn create_event_artists_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS event_artists (
            event_id TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
            artist_id TEXT NOT NULL REFERENCES artists(id) ON DELETE CASCADE,
            performance_order INTEGER NOT NULL,
            is_headliner INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (event_id, artist_id),
            CHECK (performance_order > 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_event_artists_artist ON event_artists(artist_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create one physical Gold table
///
/// Both buffers share this shape; `table` must be one of the two fixed
/// physical table names.
pub async fn create_published_events_table(pool: &SqlitePool, table: &str) -> Result<()> {
    let sql = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id TEXT PRIMARY KEY,
            venue_id TEXT NOT NULL,
            venue_name TEXT NOT NULL,
            event_date TEXT NOT NULL,
            start_time TEXT,
            end_time TEXT,
            name TEXT NOT NULL,
            price_min REAL,
            price_max REAL,
            is_free INTEGER NOT NULL DEFAULT 0,
            description TEXT,
            age_restriction TEXT,
            ticket_url TEXT,
            genre_names TEXT NOT NULL DEFAULT '',
            artist_names TEXT NOT NULL DEFAULT '',
            genre_count INTEGER NOT NULL DEFAULT 0,
            artist_count INTEGER NOT NULL DEFAULT 0,
            search_text TEXT NOT NULL DEFAULT '',
            published_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#
    );
    sqlx::query(&sql).execute(pool).await?;

    let idx = format!("CREATE INDEX IF NOT EXISTS idx_{table}_date ON {table}(event_date, start_time)");
    sqlx::query(&idx).execute(pool).await?;

    Ok(())
}

/// Create the aggregate stat projection tables
pub async fn create_stats_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS genre_stats (
            genre_id TEXT PRIMARY KEY,
            genre_name TEXT NOT NULL,
            event_count INTEGER NOT NULL DEFAULT 0,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS venue_stats (
            venue_id TEXT PRIMARY KEY,
            venue_name TEXT NOT NULL,
            event_count INTEGER NOT NULL DEFAULT 0,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the operational pipeline log table
///
/// Append-only; written by every engine, read only by operators.
pub async fn create_pipeline_log_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pipeline_log (
            id TEXT PRIMARY KEY,
            procedure TEXT NOT NULL,
            batch_size INTEGER,
            processed_count INTEGER NOT NULL DEFAULT 0,
            published_count INTEGER NOT NULL DEFAULT 0,
            quarantined_count INTEGER NOT NULL DEFAULT 0,
            error_count INTEGER NOT NULL DEFAULT 0,
            error_summary TEXT,
            duration_ms INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL CHECK (status IN ('success', 'failed')),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_pipeline_log_created ON pipeline_log(created_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the purge log table
pub async fn create_purge_log_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS purge_log (
            id TEXT PRIMARY KEY,
            threshold_date TEXT NOT NULL,
            rows_deleted INTEGER NOT NULL DEFAULT 0,
            duration_ms INTEGER NOT NULL DEFAULT 0,
            purge_type TEXT NOT NULL CHECK (purge_type IN ('automated', 'manual')),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Initialize or update default settings
///
/// Ensures all required settings exist with default values; NULL values are
/// reset to defaults.
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    // Retention and publish pacing
    ensure_setting(pool, "retention_days", "90").await?;
    ensure_setting(pool, "publish_batch_size", "500").await?;
    ensure_setting(pool, "publish_interval_minutes", "60").await?;

    // Daily maintenance times (hour of day, local clock)
    ensure_setting(pool, "purge_hour", "4").await?;
    ensure_setting(pool, "rebuild_hour", "3").await?;

    // Gold read pointer: which physical table serves reads right now
    ensure_setting(pool, "gold_active_table", "published_events_a").await?;

    ensure_setting(pool, "scheduler_enabled", "true").await?;

    info!("Default settings initialized");
    Ok(())
}

/// Ensure a setting exists with the specified default value
///
/// If the setting doesn't exist, it will be created with the default.
/// If the setting exists but has a NULL value, it will be reset to the default.
pub async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM settings WHERE key = ?)")
        .bind(key)
        .fetch_one(pool)
        .await?;

    if !exists {
        // INSERT OR IGNORE handles concurrent initialization races
        sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(default_value)
            .execute(pool)
            .await?;
        return Ok(());
    }

    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_one(pool)
        .await?;

    if value.is_none() {
        sqlx::query("UPDATE settings SET value = ? WHERE key = ?")
            .bind(default_value)
            .bind(key)
            .execute(pool)
            .await?;

        tracing::warn!("Setting '{}' was NULL, reset to default: {}", key, default_value);
    }

    Ok(())
}
