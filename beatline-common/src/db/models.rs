//! Database models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Producer source kinds accepted by the Bronze tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Scraper,
    UserSubmission,
    AdminEdit,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Scraper => "scraper",
            SourceType::UserSubmission => "user_submission",
            SourceType::AdminEdit => "admin_edit",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scraper" => Ok(SourceType::Scraper),
            "user_submission" => Ok(SourceType::UserSubmission),
            "admin_edit" => Ok(SourceType::AdminEdit),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown source type: {other}"
            ))),
        }
    }
}

/// Venue dimension row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Venue {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub address: Option<String>,
    pub city: Option<String>,
}

/// Genre dimension row (fixed controlled vocabulary)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Genre {
    pub id: String,
    pub name: String,
    pub slug: String,
}

/// Gold denormalized event row, as served to readers
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PublishedEvent {
    pub id: String,
    pub venue_id: String,
    pub venue_name: String,
    pub event_date: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub name: String,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub is_free: bool,
    pub description: Option<String>,
    pub age_restriction: Option<String>,
    pub ticket_url: Option<String>,
    pub genre_names: String,
    pub artist_names: String,
    pub genre_count: i64,
    pub artist_count: i64,
    pub search_text: String,
    pub published_at: String,
}

/// Aggregate projection row (per-genre or per-venue future-event count)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AggregateStat {
    pub id: String,
    pub name: String,
    pub event_count: i64,
}

/// Operational pipeline log row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PipelineLogEntry {
    pub id: String,
    pub procedure: String,
    pub batch_size: Option<i64>,
    pub processed_count: i64,
    pub published_count: i64,
    pub quarantined_count: i64,
    pub error_count: i64,
    pub error_summary: Option<String>,
    pub duration_ms: i64,
    pub status: String,
    pub created_at: String,
}

/// Purge log row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PurgeLogEntry {
    pub id: String,
    pub threshold_date: String,
    pub rows_deleted: i64,
    pub duration_ms: i64,
    pub purge_type: String,
    pub created_at: String,
}
