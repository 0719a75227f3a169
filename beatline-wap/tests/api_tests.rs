//! Integration tests for the beatline-wap HTTP API
//!
//! Each test spins up a fresh database in a temp folder and drives the
//! router directly with `tower::ServiceExt::oneshot`.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot` method

use beatline_wap::{build_router, AppState};

/// Test helper: fresh database in a temp folder
async fn setup_test_db() -> (SqlitePool, TempDir) {
    let dir = TempDir::new().expect("Should create temp dir");
    let db_path = dir.path().join("beatline-test.db");
    let pool = beatline_common::db::init_database(&db_path)
        .await
        .expect("Should initialize database");
    (pool, dir)
}

/// Test helper: create app over the given pool
fn setup_app(db: SqlitePool) -> axum::Router {
    build_router(AppState::new(db))
}

/// Test helper: bodyless request
fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Test helper: JSON request
fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Test helper: extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

async fn seed_venue(db: &SqlitePool, id: &str, name: &str) {
    sqlx::query("INSERT INTO venues (id, name, slug) VALUES (?, ?, ?)")
        .bind(id)
        .bind(name)
        .bind(name.to_lowercase().replace(' ', "-"))
        .execute(db)
        .await
        .expect("Should insert venue");
}

/// Date N days from today, ISO formatted
fn date_in(days: i64) -> String {
    (chrono::Utc::now().date_naive() + chrono::Duration::days(days))
        .format("%Y-%m-%d")
        .to_string()
}

fn candidate_json(venue_id: &str, days_ahead: i64, start_time: &str, name: &str) -> Value {
    json!({
        "venue_id": venue_id,
        "event_date": date_in(days_ahead),
        "start_time": start_time,
        "name": name,
    })
}

// =============================================================================
// Health Endpoint Tests
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (db, _dir) = setup_test_db().await;
    let app = setup_app(db);

    let response = app.oneshot(test_request("GET", "/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "beatline-wap");
    assert_eq!(body["database"], "connected");
    assert!(body["version"].is_string());
}

// =============================================================================
// Ingestion Tests
// =============================================================================

#[tokio::test]
async fn test_ingest_reports_created_and_updated() {
    let (db, _dir) = setup_test_db().await;
    seed_venue(&db, "venue-1", "Substation").await;
    let app = setup_app(db);

    let body = json!({
        "events": [
            candidate_json("venue-1", 3, "22:00", "Opening"),
            candidate_json("venue-1", 3, "22:00", "Opening (updated)"),
        ],
        "provenance": { "scraper_run": "test" },
    });
    let response = app
        .oneshot(json_request("POST", "/api/ingest/scraper", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let report = extract_json(response.into_body()).await;
    assert_eq!(report["processed"], 2);
    assert_eq!(report["created"], 1);
    assert_eq!(report["updated"], 1);
    assert_eq!(report["failed"], 0);
    assert!(report["bronze_id"].is_string());
}

#[tokio::test]
async fn test_ingest_rejects_unknown_source_type() {
    let (db, _dir) = setup_test_db().await;
    let app = setup_app(db);

    let body = json!({ "events": [candidate_json("venue-1", 3, "22:00", "x")] });
    let response = app
        .oneshot(json_request("POST", "/api/ingest/bogus", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let error = extract_json(response.into_body()).await;
    assert_eq!(error["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_ingest_rejects_empty_batch() {
    let (db, _dir) = setup_test_db().await;
    let app = setup_app(db);

    let body = json!({ "events": [] });
    let response = app
        .oneshot(json_request("POST", "/api/ingest/scraper", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_replay_endpoint_reprocesses_capture() {
    let (db, _dir) = setup_test_db().await;
    seed_venue(&db, "venue-1", "Substation").await;
    let app = setup_app(db.clone());

    let body = json!({ "events": [candidate_json("venue-1", 3, "22:00", "Night")] });
    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/ingest/scraper", &body))
        .await
        .unwrap();
    let report = extract_json(response.into_body()).await;
    let capture_id = report["bronze_id"].as_str().unwrap().to_string();

    sqlx::query("DELETE FROM events").execute(&db).await.unwrap();

    let response = app
        .oneshot(test_request(
            "POST",
            &format!("/api/ingest/replay/{capture_id}"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let replay = extract_json(response.into_body()).await;
    assert_eq!(replay["bronze_id"], capture_id.as_str());
    assert_eq!(replay["created"], 1);
}

#[tokio::test]
async fn test_replay_unknown_capture_returns_not_found() {
    let (db, _dir) = setup_test_db().await;
    let app = setup_app(db);

    let response = app
        .oneshot(test_request("POST", "/api/ingest/replay/no-such-capture"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// WAP Workflow Tests
// =============================================================================

#[tokio::test]
async fn test_audit_endpoint_reports_quarantines() {
    let (db, _dir) = setup_test_db().await;
    seed_venue(&db, "venue-1", "Substation").await;
    let app = setup_app(db);

    let body = json!({ "events": [candidate_json("venue-1", -5, "20:00", "Old Night")] });
    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/ingest/scraper", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(test_request("POST", "/api/wap/audit"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let report = extract_json(response.into_body()).await;
    assert_eq!(report["status"], "success");
    assert_eq!(report["audit_passed"], true);
    assert_eq!(report["quarantined"], 1);
    assert_eq!(report["hard_errors"], 0);
}

#[tokio::test]
async fn test_publish_then_list_events() {
    let (db, _dir) = setup_test_db().await;
    seed_venue(&db, "venue-1", "Substation").await;
    let app = setup_app(db);

    let body = json!({
        "events": [
            candidate_json("venue-1", 5, "22:00", "Warehouse Night"),
            candidate_json("venue-1", 3, "21:00", "Early Session"),
        ],
    });
    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/ingest/scraper", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/wap/publish", &json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let report = extract_json(response.into_body()).await;
    assert_eq!(report["status"], "success");
    assert_eq!(report["published"], 2);

    let response = app
        .clone()
        .oneshot(test_request("GET", "/api/events"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listing = extract_json(response.into_body()).await;
    assert_eq!(listing["count"], 2);
    // Sorted by date then start time
    assert_eq!(listing["events"][0]["name"], "Early Session");
    assert_eq!(listing["events"][1]["name"], "Warehouse Night");
    assert_eq!(listing["events"][0]["venue_name"], "Substation");

    let response = app
        .oneshot(test_request("GET", "/api/stats/venues"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let stats = extract_json(response.into_body()).await;
    assert_eq!(stats[0]["name"], "Substation");
    assert_eq!(stats[0]["event_count"], 2);
}

#[tokio::test]
async fn test_publish_conflict_on_hard_errors() {
    let (db, _dir) = setup_test_db().await;
    seed_venue(&db, "venue-1", "Substation").await;
    let app = setup_app(db);

    // Candidate with no name: structurally broken, blocks the batch
    let body = json!({
        "events": [{
            "venue_id": "venue-1",
            "event_date": date_in(3),
            "start_time": "22:00",
        }],
    });
    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/ingest/user_submission", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(json_request("POST", "/api/wap/publish", &json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let error = extract_json(response.into_body()).await;
    assert_eq!(error["error"]["code"], "AUDIT_BLOCKED");
}

#[tokio::test]
async fn test_publish_honors_requested_batch_size() {
    let (db, _dir) = setup_test_db().await;
    seed_venue(&db, "venue-1", "Substation").await;
    let app = setup_app(db);

    let body = json!({
        "events": [
            candidate_json("venue-1", 3, "20:00", "One"),
            candidate_json("venue-1", 4, "20:00", "Two"),
            candidate_json("venue-1", 5, "20:00", "Three"),
        ],
    });
    app.clone()
        .oneshot(json_request("POST", "/api/ingest/scraper", &body))
        .await
        .unwrap();

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/wap/publish",
            &json!({ "batch_size": 2 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let report = extract_json(response.into_body()).await;
    assert_eq!(report["published"], 2);
    assert_eq!(report["batch_size"], 2);
}

#[tokio::test]
async fn test_rebuild_endpoint_swaps_active_table() {
    let (db, _dir) = setup_test_db().await;
    seed_venue(&db, "venue-1", "Substation").await;
    let app = setup_app(db.clone());

    let body = json!({ "events": [candidate_json("venue-1", 3, "22:00", "Warehouse Night")] });
    app.clone()
        .oneshot(json_request("POST", "/api/ingest/scraper", &body))
        .await
        .unwrap();
    app.clone()
        .oneshot(json_request("POST", "/api/wap/publish", &json!({})))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(test_request("POST", "/api/wap/rebuild"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let report = extract_json(response.into_body()).await;
    assert_eq!(report["active_table"], "published_events_b");
    assert_eq!(report["rows_built"], 1);

    // Reads follow the pointer to the fresh buffer
    let response = app
        .oneshot(test_request("GET", "/api/events"))
        .await
        .unwrap();
    let listing = extract_json(response.into_body()).await;
    assert_eq!(listing["count"], 1);
    assert_eq!(listing["events"][0]["name"], "Warehouse Night");
}

#[tokio::test]
async fn test_manual_purge_endpoint_writes_log() {
    let (db, _dir) = setup_test_db().await;
    let app = setup_app(db);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/wap/purge",
            &json!({ "retention_days": 30 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let report = extract_json(response.into_body()).await;
    assert_eq!(report["status"], "success");
    assert_eq!(report["rows_deleted"], 0);

    let response = app
        .oneshot(test_request("GET", "/api/log/purges"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let log = extract_json(response.into_body()).await;
    assert_eq!(log.as_array().unwrap().len(), 1);
    assert_eq!(log[0]["purge_type"], "manual");
}

// =============================================================================
// Dimension Listing Tests
// =============================================================================

#[tokio::test]
async fn test_genre_and_venue_listings() {
    let (db, _dir) = setup_test_db().await;
    seed_venue(&db, "venue-1", "Substation").await;
    let app = setup_app(db);

    let response = app
        .clone()
        .oneshot(test_request("GET", "/api/genres"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let genres = extract_json(response.into_body()).await;
    let names: Vec<&str> = genres
        .as_array()
        .unwrap()
        .iter()
        .map(|g| g["name"].as_str().unwrap())
        .collect();
    assert_eq!(names.len(), 10);
    assert!(names.contains(&"Techno"));

    let response = app
        .oneshot(test_request("GET", "/api/venues"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let venues = extract_json(response.into_body()).await;
    assert_eq!(venues.as_array().unwrap().len(), 1);
    assert_eq!(venues[0]["name"], "Substation");
}

// =============================================================================
// Operator Endpoint Tests
// =============================================================================

#[tokio::test]
async fn test_metrics_endpoint_counts_all_tiers() {
    let (db, _dir) = setup_test_db().await;
    seed_venue(&db, "venue-1", "Substation").await;
    let app = setup_app(db);

    let body = json!({
        "events": [
            candidate_json("venue-1", 3, "22:00", "Keep"),
            candidate_json("venue-1", -5, "20:00", "Stale"),
        ],
    });
    app.clone()
        .oneshot(json_request("POST", "/api/ingest/scraper", &body))
        .await
        .unwrap();
    app.clone()
        .oneshot(json_request("POST", "/api/wap/publish", &json!({})))
        .await
        .unwrap();

    let response = app
        .oneshot(test_request("GET", "/api/metrics"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let metrics = extract_json(response.into_body()).await;
    assert_eq!(metrics["silver"]["published"], 1);
    assert_eq!(metrics["silver"]["quarantined"], 1);
    assert_eq!(metrics["silver"]["pending"], 0);
    assert_eq!(metrics["silver"]["rejected"], 0);
    assert_eq!(metrics["gold"]["active_table"], "published_events_a");
    assert_eq!(metrics["gold"]["events"], 1);
    assert_eq!(metrics["bronze"]["captures"], 1);
}

#[tokio::test]
async fn test_scheduler_jobs_endpoint() {
    let (db, _dir) = setup_test_db().await;
    let app = setup_app(db);

    let response = app
        .oneshot(test_request("GET", "/api/scheduler/jobs"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let jobs = extract_json(response.into_body()).await;
    assert_eq!(jobs["enabled"], true);
    assert_eq!(jobs["jobs"][0]["name"], "auto_publish");
    assert_eq!(jobs["jobs"][0]["interval_minutes"], 60);
    assert_eq!(jobs["jobs"][0]["batch_size"], 500);
    assert_eq!(jobs["jobs"][1]["name"], "gold_rebuild");
    assert_eq!(jobs["jobs"][1]["hour"], 3);
    assert_eq!(jobs["jobs"][2]["name"], "retention_purge");
    assert_eq!(jobs["jobs"][2]["hour"], 4);
    assert_eq!(jobs["jobs"][2]["retention_days"], 90);
}

#[tokio::test]
async fn test_pipeline_log_endpoint() {
    let (db, _dir) = setup_test_db().await;
    seed_venue(&db, "venue-1", "Substation").await;
    let app = setup_app(db);

    let body = json!({ "events": [candidate_json("venue-1", 3, "22:00", "Night")] });
    app.clone()
        .oneshot(json_request("POST", "/api/ingest/scraper", &body))
        .await
        .unwrap();
    app.clone()
        .oneshot(test_request("POST", "/api/wap/audit"))
        .await
        .unwrap();
    app.clone()
        .oneshot(json_request("POST", "/api/wap/publish", &json!({})))
        .await
        .unwrap();

    let response = app
        .oneshot(test_request("GET", "/api/log/pipeline"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let log = extract_json(response.into_body()).await;
    let procedures: Vec<&str> = log
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["procedure"].as_str().unwrap())
        .collect();
    assert!(procedures.contains(&"audit"));
    assert!(procedures.contains(&"publish"));
}
