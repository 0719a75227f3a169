//! Background scheduler
//!
//! Recurring pipeline jobs: auto-publish on an interval, Gold rebuild and
//! retention purge at fixed hours of day. One task per job kind, so jobs of
//! the same kind never overlap themselves; a job failure is logged and the
//! loop keeps running. Retry policy lives with the scheduler cadence, not
//! inside the engines.

use beatline_common::db::settings;
use chrono::{Local, NaiveTime, TimeZone};
use sqlx::{Pool, Sqlite};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::services::publish_engine;
use crate::services::purge_engine::{self, PurgeType};
use crate::services::rebuild_engine;
use crate::AppState;

/// Spawn all recurring jobs; returns immediately
pub async fn spawn_scheduler(state: &AppState) {
    match settings::get_scheduler_enabled(&state.db).await {
        Ok(true) => {}
        Ok(false) => {
            warn!("Scheduler disabled (scheduler_enabled=false)");
            return;
        }
        Err(e) => {
            error!(error = %e, "Could not read scheduler settings, scheduler not started");
            return;
        }
    }

    let db = state.db.clone();
    tokio::spawn(async move { publish_loop(db).await });

    let db = state.db.clone();
    tokio::spawn(async move { rebuild_loop(db).await });

    let db = state.db.clone();
    tokio::spawn(async move { purge_loop(db).await });

    info!("Scheduler started: auto-publish, daily rebuild, daily purge");
}

/// Auto-publish every `publish_interval_minutes`
async fn publish_loop(db: Pool<Sqlite>) {
    loop {
        let minutes = match settings::get_publish_interval_minutes(&db).await {
            Ok(m) => m.max(1),
            Err(e) => {
                error!(error = %e, "Failed to read publish interval, using 60 minutes");
                60
            }
        };

        tokio::time::sleep(Duration::from_secs(minutes as u64 * 60)).await;

        let batch_size = match settings::get_publish_batch_size(&db).await {
            Ok(b) => b,
            Err(e) => {
                error!(error = %e, "Failed to read publish batch size, skipping run");
                continue;
            }
        };

        info!(batch_size, "Scheduled publish starting");
        if let Err(e) = publish_engine::run_publish(&db, batch_size).await {
            // Already logged to pipeline_log by the engine; keep the loop alive
            error!(error = %e, "Scheduled publish failed");
        }
    }
}

/// Daily Gold rebuild at `rebuild_hour`
async fn rebuild_loop(db: Pool<Sqlite>) {
    loop {
        let hour = settings::get_rebuild_hour(&db).await.unwrap_or(3);
        sleep_until_hour(hour).await;

        info!("Scheduled rebuild starting");
        if let Err(e) = rebuild_engine::run_rebuild(&db).await {
            error!(error = %e, "Scheduled rebuild failed");
        }
    }
}

/// Daily retention purge at `purge_hour`
async fn purge_loop(db: Pool<Sqlite>) {
    loop {
        let hour = settings::get_purge_hour(&db).await.unwrap_or(4);
        sleep_until_hour(hour).await;

        let retention_days = match settings::get_retention_days(&db).await {
            Ok(d) => d,
            Err(e) => {
                error!(error = %e, "Failed to read retention days, skipping purge");
                continue;
            }
        };

        info!(retention_days, "Scheduled purge starting");
        if let Err(e) = purge_engine::run_purge(&db, retention_days, PurgeType::Automated).await {
            error!(error = %e, "Scheduled purge failed");
        }
    }
}

/// Sleep until the next local occurrence of `hour`:00
async fn sleep_until_hour(hour: u32) {
    let now = Local::now();
    let target_time = NaiveTime::from_hms_opt(hour % 24, 0, 0).unwrap_or(NaiveTime::MIN);

    let mut target_date = now.date_naive();
    if now.time() >= target_time {
        target_date = target_date.succ_opt().unwrap_or(target_date);
    }

    let target = Local
        .from_local_datetime(&target_date.and_time(target_time))
        .earliest()
        .unwrap_or(now);

    let wait = (target - now).to_std().unwrap_or(Duration::from_secs(60));
    tokio::time::sleep(wait).await;
}
