//! Score-anomaly detection and cache refresh over the HTTP surface.

mod common;

use axum::http::StatusCode;
use cp_core::models::{ContentType, TrustCause};
use serde_json::json;
use uuid::Uuid;

use common::spawn_app;

// Trust 100 upvote (weight 2.0) against a trust 5 downvote (weight 0.1):
// the raw score cancels to zero while the weighted score lands at 1.9,
// a 190% divergence against the max(1, |raw|) floor.
#[tokio::test]
async fn opposed_extreme_trust_votes_surface_as_anomaly() {
    let app = spawn_app().await;
    let author = app.seed_user(50.0, false).await;
    let heavy = app.seed_user(100.0, false).await;
    let light = app.seed_user(5.0, false).await;
    let content = app.seed_content(ContentType::Idea, author).await;

    app.cast_vote(heavy, content, 1).await;
    app.cast_vote(light, content, -1).await;

    let (status, body) = app
        .get("/analytics/score-anomalies?threshold=0.5", None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let anomalies = body["anomalies"].as_array().unwrap();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0]["raw_score"], 0);
    assert!((anomalies[0]["weighted_score"].as_f64().unwrap() - 1.9).abs() < 1e-9);
    assert!((anomalies[0]["divergence_percent"].as_f64().unwrap() - 190.0).abs() < 1e-9);
}

// A scan that already ran must not pin its aggregates: when a voter's
// trust moves afterwards, the next scan reports the new divergence.
#[tokio::test]
async fn anomaly_scan_reflects_trust_changes_since_last_read() {
    let app = spawn_app().await;
    let author = app.seed_user(50.0, false).await;
    let heavy = app.seed_user(100.0, false).await;
    let light = app.seed_user(5.0, false).await;
    let content = app.seed_content(ContentType::Idea, author).await;

    app.cast_vote(heavy, content, 1).await;
    app.cast_vote(light, content, -1).await;

    // First scan warms the aggregate at 190% divergence.
    let (status, body) = app
        .get("/analytics/score-anomalies?threshold=1.0", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["anomalies"].as_array().unwrap().len(), 1);

    // The heavy voter loses standing: weight drops to 1.0, so the
    // weighted score is 0.9 and divergence 90%, below the cutoff.
    app.ledger
        .apply_delta(heavy, -50.0, TrustCause::Manual)
        .await
        .unwrap();

    let (status, body) = app
        .get("/analytics/score-anomalies?threshold=1.0", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["anomalies"].as_array().unwrap().is_empty());
}

// Uniform trust means weight 1.0 across the board, so raw and weighted
// agree exactly and nothing crosses any threshold.
#[tokio::test]
async fn uniform_trust_votes_never_diverge() {
    let app = spawn_app().await;
    let author = app.seed_user(50.0, false).await;
    let content = app.seed_content(ContentType::Idea, author).await;
    for _ in 0..10 {
        let voter = app.seed_user(50.0, false).await;
        app.cast_vote(voter, content, 1).await;
    }

    let uri = format!("/content/idea/{}/quality-signals", content.content_id);
    let (_, signals) = app.get(&uri, None).await;
    assert_eq!(signals["raw_score"], 10);
    assert!((signals["weighted_score"].as_f64().unwrap() - 10.0).abs() < 1e-9);

    let (status, body) = app
        .get("/analytics/score-anomalies?threshold=0.1", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["anomalies"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn threshold_is_required_and_bounded() {
    let app = spawn_app().await;

    let (status, _) = app.get("/analytics/score-anomalies", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .get("/analytics/score-anomalies?threshold=1.5", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .get("/analytics/score-anomalies?threshold=-0.1", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn anomaly_listing_pages_by_magnitude() {
    let app = spawn_app().await;
    let author = app.seed_user(50.0, false).await;
    let heavy = app.seed_user(100.0, false).await;
    let light = app.seed_user(5.0, false).await;

    // Two anomalous items with different magnitudes.
    let strong = app.seed_content(ContentType::Idea, author).await;
    app.cast_vote(heavy, strong, 1).await;
    app.cast_vote(light, strong, -1).await; // 190%

    let weak = app.seed_content(ContentType::Idea, author).await;
    app.cast_vote(heavy, weak, 1).await; // raw 1, weighted 2.0 -> 100%

    let (status, body) = app
        .get("/analytics/score-anomalies?threshold=0.5&limit=1", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let first = &body["anomalies"].as_array().unwrap()[0];
    assert_eq!(
        first["content"]["content_id"],
        json!(strong.content_id)
    );

    let (_, body) = app
        .get("/analytics/score-anomalies?threshold=0.5&limit=1&offset=1", None)
        .await;
    let second = &body["anomalies"].as_array().unwrap()[0];
    assert_eq!(second["content"]["content_id"], json!(weak.content_id));
}

#[tokio::test]
async fn refresh_cache_targets_one_item_or_all() {
    let app = spawn_app().await;
    let author = app.seed_user(50.0, false).await;
    let voter = app.seed_user(50.0, false).await;
    let a = app.seed_content(ContentType::Idea, author).await;
    let b = app.seed_content(ContentType::Comment, author).await;
    app.cast_vote(voter, a, 1).await;
    app.cast_vote(voter, b, -1).await;

    let (status, body) = app
        .post(
            "/analytics/refresh-cache",
            voter,
            json!({ "content_type": a.content_type, "content_id": a.content_id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["refreshed"], 1);
    assert_eq!(body["signals"]["raw_score"], 1);

    let (status, body) = app.post("/analytics/refresh-cache", voter, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["refreshed"], 2);

    // A key half-specified is rejected outright.
    let (status, _) = app
        .post(
            "/analytics/refresh-cache",
            voter,
            json!({ "content_id": Uuid::now_v7() }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
