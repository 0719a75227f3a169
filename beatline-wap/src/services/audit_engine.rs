//! Audit & quarantine engine
//!
//! Applies a fixed, ordered list of set-based quarantine rules over all
//! pending Silver rows, then counts hard errors (structurally broken rows)
//! that must block publishing entirely. Each rule only ever matches
//! `status = 'pending'`, so re-running a pass never double-penalizes a row.

use beatline_common::Result;
use serde::Serialize;
use sqlx::SqliteConnection;
use std::fmt::Write as _;
use std::time::Instant;

use crate::services::ops_log::{self, OpOutcome};

/// One quarantine rule: a SQL predicate over pending events and the reason
/// recorded on matching rows
#[derive(Debug, Clone, Copy)]
pub struct AuditRule {
    pub name: &'static str,
    pub reason: &'static str,
    pub predicate: &'static str,
}

/// The fixed rule list, applied in order
///
/// Rules are independent: each one is a standalone predicate, and adding a
/// rule means adding a row here, not another branch in procedural code.
pub fn quarantine_rules() -> &'static [AuditRule] {
    &[
        AuditRule {
            name: "past_date",
            reason: "past date",
            predicate: "event_date IS NOT NULL AND event_date < date('now')",
        },
        AuditRule {
            name: "temporal_logic",
            reason: "temporal logic: end time precedes start time",
            predicate: "start_time IS NOT NULL AND end_time IS NOT NULL AND end_time < start_time",
        },
        AuditRule {
            name: "too_far_future",
            reason: "too far future",
            predicate: "event_date IS NOT NULL AND event_date > date('now', '+6 months')",
        },
        AuditRule {
            name: "orphaned_venue",
            reason: "orphaned: venue does not exist",
            predicate: "venue_id IS NOT NULL AND venue_id NOT IN (SELECT id FROM venues)",
        },
        AuditRule {
            name: "price_free_conflict",
            reason: "price/free conflict",
            predicate: "is_free = 1 AND (price_min IS NOT NULL OR price_max IS NOT NULL)",
        },
    ]
}

/// Rows matching this are hard errors: recorded, left pending, and they
/// block the encompassing publish batch until resolved
const HARD_ERROR_PREDICATE: &str =
    "status = 'pending' AND (venue_id IS NULL OR event_date IS NULL OR name IS NULL)";

/// Result of one audit pass
#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    /// Pending rows examined at the start of the pass
    pub processed: i64,
    /// Rows quarantined by this pass
    pub quarantined: i64,
    /// Structurally broken rows left pending (publish blockers)
    pub hard_errors: i64,
    /// Human-readable summary of what each rule caught
    pub summary: String,
}

impl AuditReport {
    pub fn passed(&self) -> bool {
        self.hard_errors == 0
    }
}

/// Run one audit pass on the given connection
///
/// Callers choose the commit scope: on a pooled connection each rule UPDATE
/// commits independently; inside a publish transaction all effects join
/// that transaction.
pub async fn run_audit(conn: &mut SqliteConnection) -> Result<AuditReport> {
    let processed: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events WHERE status = 'pending'")
        .fetch_one(&mut *conn)
        .await?;

    let mut quarantined = 0i64;
    let mut summary = String::new();

    for rule in quarantine_rules() {
        let sql = format!(
            "UPDATE events
             SET status = 'quarantined', rejection_reason = ?, updated_at = CURRENT_TIMESTAMP
             WHERE status = 'pending' AND ({})",
            rule.predicate
        );

        let affected = sqlx::query(&sql)
            .bind(rule.reason)
            .execute(&mut *conn)
            .await?
            .rows_affected() as i64;

        if affected > 0 {
            tracing::info!(rule = rule.name, count = affected, "Quarantined events");
            let _ = write!(summary, "{}: {} quarantined; ", rule.name, affected);
        }
        quarantined += affected;
    }

    let hard_errors: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM events WHERE {HARD_ERROR_PREDICATE}"
    ))
    .fetch_one(&mut *conn)
    .await?;

    if hard_errors > 0 {
        tracing::warn!(count = hard_errors, "Hard errors remain pending and block publish");
        let _ = write!(
            summary,
            "{hard_errors} hard error(s): required fields missing (venue_id/event_date/name); "
        );
    }

    Ok(AuditReport {
        processed,
        quarantined,
        hard_errors,
        summary: summary.trim_end_matches("; ").to_string(),
    })
}

/// Standalone audit invocation: rule updates commit independently and one
/// pipeline log entry is written (failed iff hard errors remain)
pub async fn run_audit_standalone(db: &sqlx::Pool<sqlx::Sqlite>) -> Result<AuditReport> {
    let started = Instant::now();
    let mut conn = db.acquire().await?;
    let report = run_audit(&mut conn).await?;
    drop(conn);

    ops_log::record(
        db,
        "audit",
        &OpOutcome {
            batch_size: None,
            processed: report.processed,
            published: 0,
            quarantined: report.quarantined,
            errors: report.hard_errors,
            summary: (!report.summary.is_empty()).then(|| report.summary.clone()),
            duration_ms: started.elapsed().as_millis() as i64,
            success: report.passed(),
        },
    )
    .await?;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_order_is_fixed() {
        let names: Vec<&str> = quarantine_rules().iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec![
                "past_date",
                "temporal_logic",
                "too_far_future",
                "orphaned_venue",
                "price_free_conflict"
            ]
        );
    }

    #[test]
    fn every_rule_carries_a_reason() {
        for rule in quarantine_rules() {
            assert!(!rule.reason.is_empty(), "rule {} has no reason", rule.name);
            assert!(rule.predicate.contains("IS NOT NULL") || rule.predicate.contains("is_free"));
        }
    }
}
