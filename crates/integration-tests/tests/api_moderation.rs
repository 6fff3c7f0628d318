//! Flag filing, queue access, and review decisions end to end.

mod common;

use axum::http::StatusCode;
use cp_core::models::{ContentRef, ContentStatus, ContentType};
use cp_core::traits::EngineStore;
use serde_json::{json, Value};
use uuid::Uuid;

use common::{spawn_app, TestApp};

async fn file_flag(app: &TestApp, reporter: Uuid, content: ContentRef) -> (StatusCode, Value) {
    app.post(
        "/moderation/flags",
        reporter,
        json!({
            "content_type": content.content_type,
            "content_id": content.content_id,
            "reason": "spam",
        }),
    )
    .await
}

async fn content_status(app: &TestApp, content: ContentRef) -> ContentStatus {
    app.store
        .content_meta(content)
        .await
        .unwrap()
        .expect("content exists")
        .status
}

#[tokio::test]
async fn flag_is_filed_and_duplicates_conflict() {
    let app = spawn_app().await;
    let author = app.seed_user(50.0, false).await;
    let reporter = app.seed_user(50.0, false).await;
    let content = app.seed_content(ContentType::Idea, author).await;

    let (status, flag) = file_flag(&app, reporter, content).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(flag["reason"], "spam");
    assert_eq!(flag["reviewed"], false);

    // Same reporter, same content, still unreviewed.
    let (status, body) = file_flag(&app, reporter, content).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["retryable"], false);

    // One open flag does not touch visibility.
    assert_eq!(content_status(&app, content).await, ContentStatus::Approved);
}

#[tokio::test]
async fn third_distinct_reporter_auto_hides() {
    let app = spawn_app().await;
    let author = app.seed_user(50.0, false).await;
    let content = app.seed_content(ContentType::Idea, author).await;

    for _ in 0..2 {
        let reporter = app.seed_user(50.0, false).await;
        file_flag(&app, reporter, content).await;
    }
    assert_eq!(content_status(&app, content).await, ContentStatus::Approved);

    let reporter = app.seed_user(50.0, false).await;
    let (status, _) = file_flag(&app, reporter, content).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_status(&app, content).await, ContentStatus::Hidden);
}

#[tokio::test]
async fn queue_is_moderator_only() {
    let app = spawn_app().await;
    let citizen = app.seed_user(50.0, false).await;
    let moderator = app.seed_user(50.0, true).await;

    let (status, _) = app.get("/moderation/queue", Some(citizen)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.get("/moderation/queue", Some(moderator)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn queue_groups_flags_per_content() {
    let app = spawn_app().await;
    let author = app.seed_user(72.5, false).await;
    let moderator = app.seed_user(50.0, true).await;
    let content = app.seed_content(ContentType::Comment, author).await;

    for _ in 0..3 {
        let reporter = app.seed_user(50.0, false).await;
        file_flag(&app, reporter, content).await;
    }

    let (status, body) = app
        .get("/moderation/queue?content_type=comment", Some(moderator))
        .await;
    assert_eq!(status, StatusCode::OK);
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["flag_count"], 3);
    assert_eq!(items[0]["distinct_reporters"], 3);
    assert_eq!(items[0]["is_hidden"], true);
    assert_eq!(items[0]["author_trust_score"], 72.5);

    // The filter excludes the other content type entirely.
    let (_, body) = app
        .get("/moderation/queue?content_type=idea", Some(moderator))
        .await;
    assert!(body["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn dismissal_clears_the_queue_without_touching_content() {
    let app = spawn_app().await;
    let author = app.seed_user(50.0, false).await;
    let reporter = app.seed_user(50.0, false).await;
    let moderator = app.seed_user(50.0, true).await;
    let content = app.seed_content(ContentType::Idea, author).await;

    let (_, flag) = file_flag(&app, reporter, content).await;
    let flag_id = flag["id"].as_str().unwrap().to_string();

    let (status, review) = app
        .post(
            "/moderation/review",
            moderator,
            json!({
                "flag_ids": [flag_id],
                "action": "dismiss",
                "notes": "looks fine",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(review["action"], "dismiss");
    assert!(review["penalty_id"].is_null());

    assert_eq!(content_status(&app, content).await, ContentStatus::Approved);
    let score = app.ledger.get_score(author).await.unwrap();
    assert_eq!(score, 50.0);

    let (_, body) = app.get("/moderation/queue", Some(moderator)).await;
    assert!(body["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn action_with_removal_penalty_deletes_and_decrements_trust() {
    let app = spawn_app().await;
    let author = app.seed_user(50.0, false).await;
    let reporter = app.seed_user(50.0, false).await;
    let moderator = app.seed_user(50.0, true).await;
    let content = app.seed_content(ContentType::Idea, author).await;

    let (_, flag) = file_flag(&app, reporter, content).await;
    let flag_id = flag["id"].as_str().unwrap().to_string();

    let (status, review) = app
        .post(
            "/moderation/review",
            moderator,
            json!({
                "flag_ids": [flag_id.clone()],
                "action": "action",
                "issue_penalty": true,
                "penalty_type": "content_removed",
                "penalty_reason": "spam campaign",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(review["penalty_id"].is_string());

    assert_eq!(content_status(&app, content).await, ContentStatus::Deleted);
    let score = app.ledger.get_score(author).await.unwrap();
    assert_eq!(score, 35.0);

    let penalties = app.store.penalties_for(author).await.unwrap();
    assert_eq!(penalties.len(), 1);
    assert_eq!(penalties[0].trust_delta, -15.0);

    // The batch is spent; a rerun conflicts and changes nothing.
    let (status, _) = app
        .post(
            "/moderation/review",
            moderator,
            json!({ "flag_ids": [flag_id], "action": "dismiss" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(app.ledger.get_score(author).await.unwrap(), 35.0);
}

#[tokio::test]
async fn action_without_penalty_hides_only() {
    let app = spawn_app().await;
    let author = app.seed_user(50.0, false).await;
    let reporter = app.seed_user(50.0, false).await;
    let moderator = app.seed_user(50.0, true).await;
    let content = app.seed_content(ContentType::Comment, author).await;

    let (_, flag) = file_flag(&app, reporter, content).await;
    let (status, _) = app
        .post(
            "/moderation/review",
            moderator,
            json!({
                "flag_ids": [flag["id"]],
                "action": "action",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_status(&app, content).await, ContentStatus::Hidden);
    assert_eq!(app.ledger.get_score(author).await.unwrap(), 50.0);
}

#[tokio::test]
async fn review_scope_violations_are_rejected() {
    let app = spawn_app().await;
    let author = app.seed_user(50.0, false).await;
    let reporter = app.seed_user(50.0, false).await;
    let moderator = app.seed_user(50.0, true).await;
    let a = app.seed_content(ContentType::Idea, author).await;
    let b = app.seed_content(ContentType::Idea, author).await;

    let (_, flag_a) = file_flag(&app, reporter, a).await;
    let (_, flag_b) = file_flag(&app, reporter, b).await;

    // Empty batch.
    let (status, _) = app
        .post(
            "/moderation/review",
            moderator,
            json!({ "flag_ids": [], "action": "dismiss" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Batch spanning two content items.
    let (status, _) = app
        .post(
            "/moderation/review",
            moderator,
            json!({
                "flag_ids": [flag_a["id"], flag_b["id"]],
                "action": "dismiss",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Unknown flag id.
    let (status, _) = app
        .post(
            "/moderation/review",
            moderator,
            json!({ "flag_ids": [Uuid::now_v7()], "action": "dismiss" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Penalty on a dismissal makes no sense.
    let (status, _) = app
        .post(
            "/moderation/review",
            moderator,
            json!({
                "flag_ids": [flag_a["id"]],
                "action": "dismiss",
                "issue_penalty": true,
                "penalty_type": "warning",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Non-moderators cannot review at all.
    let (status, _) = app
        .post(
            "/moderation/review",
            reporter,
            json!({ "flag_ids": [flag_a["id"]], "action": "dismiss" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn reviewed_reporter_may_flag_again() {
    let app = spawn_app().await;
    let author = app.seed_user(50.0, false).await;
    let reporter = app.seed_user(50.0, false).await;
    let moderator = app.seed_user(50.0, true).await;
    let content = app.seed_content(ContentType::Idea, author).await;

    let (_, flag) = file_flag(&app, reporter, content).await;
    app.post(
        "/moderation/review",
        moderator,
        json!({ "flag_ids": [flag["id"]], "action": "dismiss" }),
    )
    .await;

    // Uniqueness only spans unreviewed flags.
    let (status, _) = file_flag(&app, reporter, content).await;
    assert_eq!(status, StatusCode::OK);
}
