//! Settings database access
//!
//! Read/write pipeline configuration from the settings table (key-value
//! store). All settings are global/system-wide. Accessors are generic over
//! the executor so they work on a pool or inside a transaction.

use crate::{Error, Result};
use sqlx::{Executor, Sqlite};
use std::str::FromStr;

/// Physical names of the two Gold buffers
pub const GOLD_TABLE_A: &str = "published_events_a";
pub const GOLD_TABLE_B: &str = "published_events_b";

/// Get a setting value, parsed to the requested type
pub async fn get_setting<'e, T, E>(db: E, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    E: Executor<'e, Database = Sqlite>,
{
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(db)
            .await?;

    match value.flatten() {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| Error::Config(format!("Setting '{key}' has unparseable value: {raw}"))),
        None => Ok(None),
    }
}

/// Set a setting value
pub async fn set_setting<'e, T, E>(db: E, key: &str, value: T) -> Result<()>
where
    T: ToString,
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await?;

    Ok(())
}

/// Retention window in days for the Gold tier
pub async fn get_retention_days<'e, E>(db: E) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    Ok(get_setting::<i64, E>(db, "retention_days").await?.unwrap_or(90))
}

/// Maximum number of rows one publish invocation may promote
pub async fn get_publish_batch_size<'e, E>(db: E) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    Ok(get_setting::<i64, E>(db, "publish_batch_size").await?.unwrap_or(500))
}

/// Minutes between automatic publish runs
pub async fn get_publish_interval_minutes<'e, E>(db: E) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    Ok(get_setting::<i64, E>(db, "publish_interval_minutes").await?.unwrap_or(60))
}

/// Hour of day (0-23) for the automated purge
pub async fn get_purge_hour<'e, E>(db: E) -> Result<u32>
where
    E: Executor<'e, Database = Sqlite>,
{
    Ok(get_setting::<u32, E>(db, "purge_hour").await?.unwrap_or(4) % 24)
}

/// Hour of day (0-23) for the automated Gold rebuild
pub async fn get_rebuild_hour<'e, E>(db: E) -> Result<u32>
where
    E: Executor<'e, Database = Sqlite>,
{
    Ok(get_setting::<u32, E>(db, "rebuild_hour").await?.unwrap_or(3) % 24)
}

/// Whether the background scheduler should run
pub async fn get_scheduler_enabled<'e, E>(db: E) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    Ok(get_setting::<bool, E>(db, "scheduler_enabled").await?.unwrap_or(true))
}

/// Which physical Gold table currently serves reads
pub async fn get_active_gold_table<'e, E>(db: E) -> Result<&'static str>
where
    E: Executor<'e, Database = Sqlite>,
{
    let name = get_setting::<String, E>(db, "gold_active_table")
        .await?
        .unwrap_or_else(|| GOLD_TABLE_A.to_string());

    match name.as_str() {
        GOLD_TABLE_B => Ok(GOLD_TABLE_B),
        _ => Ok(GOLD_TABLE_A),
    }
}

/// The Gold buffer not currently serving reads (the rebuild target)
pub fn inactive_gold_table(active: &str) -> &'static str {
    if active == GOLD_TABLE_A {
        GOLD_TABLE_B
    } else {
        GOLD_TABLE_A
    }
}

/// Atomically redirect reads to the given Gold table
///
/// Single-row UPDATE; readers resolve the pointer per query, so they see
/// either the old table or the fully built new one, never a partial build.
pub async fn set_active_gold_table<'e, E>(db: E, table: &str) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    if table != GOLD_TABLE_A && table != GOLD_TABLE_B {
        return Err(Error::InvalidInput(format!("Unknown gold table: {table}")));
    }
    set_setting(db, "gold_active_table", table).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_table_is_the_other_buffer() {
        assert_eq!(inactive_gold_table(GOLD_TABLE_A), GOLD_TABLE_B);
        assert_eq!(inactive_gold_table(GOLD_TABLE_B), GOLD_TABLE_A);
    }
}
