//! beatline-wap - Write-Audit-Publish pipeline microservice
//!
//! Ingests unvalidated event candidates from producers into the Bronze
//! capture log, deduplicates them into the Silver canonical store, audits
//! and quarantines defective rows, and promotes clean records into the
//! denormalized Gold read store behind a double-buffered table pointer.

pub mod api;
pub mod error;
pub mod scheduler;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::ingest_routes())
        .merge(api::wap_routes())
        .merge(api::read_routes())
        .merge(api::log_routes())
        .with_state(state)
}
