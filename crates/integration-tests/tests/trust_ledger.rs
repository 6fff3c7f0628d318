//! Ledger arithmetic against the real SQLite store.

mod common;

use cp_core::error::EngineError;
use cp_core::models::TrustCause;
use cp_engine::ContentOutcome;

use common::spawn_app;

#[tokio::test]
async fn content_outcomes_move_the_score() {
    let app = spawn_app().await;
    let user = app.seed_user(50.0, false).await;

    let score = app
        .ledger
        .record_content_outcome(user, ContentOutcome::IdeaApproved)
        .await
        .unwrap();
    assert_eq!(score, 52.0);

    let score = app
        .ledger
        .record_content_outcome(user, ContentOutcome::IdeaRejected)
        .await
        .unwrap();
    assert_eq!(score, 51.0);
}

#[tokio::test]
async fn score_clamps_at_both_bounds() {
    let app = spawn_app().await;
    let saint = app.seed_user(99.5, false).await;
    let pariah = app.seed_user(3.0, false).await;

    let score = app
        .ledger
        .record_content_outcome(saint, ContentOutcome::IdeaApproved)
        .await
        .unwrap();
    assert_eq!(score, 100.0);

    let score = app
        .ledger
        .apply_delta(pariah, -15.0, TrustCause::Manual)
        .await
        .unwrap();
    assert_eq!(score, 0.0);
}

#[tokio::test]
async fn history_records_every_event_in_order() {
    let app = spawn_app().await;
    let user = app.seed_user(50.0, false).await;

    app.ledger
        .record_content_outcome(user, ContentOutcome::IdeaApproved)
        .await
        .unwrap();
    app.ledger
        .record_content_outcome(user, ContentOutcome::IdeaRejected)
        .await
        .unwrap();

    let events = app.ledger.history(user).await.unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].delta, 2.0);
    assert_eq!(events[0].score_after, 52.0);
    assert_eq!(events[0].cause, TrustCause::IdeaApproved);
    assert_eq!(events[1].delta, -1.0);
    assert_eq!(events[1].score_after, 51.0);
}

#[tokio::test]
async fn unknown_user_is_not_found() {
    let app = spawn_app().await;
    let err = app
        .ledger
        .record_content_outcome(uuid::Uuid::now_v7(), ContentOutcome::IdeaApproved)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(..)));
}
