//! # cp-api
//!
//! The web routing and orchestration layer for the engine.

pub mod error;
pub mod handlers;
pub mod metrics;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use handlers::AppState;
pub use metrics::Metrics;

/// Builds the engine's router.
///
/// Kept as a plain `Router` constructor so the binary (and the integration
/// tests) can mount it wherever they need.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/votes", post(handlers::cast_vote))
        .route(
            "/content/{content_type}/{content_id}/quality-signals",
            get(handlers::quality_signals),
        )
        .route("/analytics/score-anomalies", get(handlers::score_anomalies))
        .route("/analytics/refresh-cache", post(handlers::refresh_cache))
        .route("/moderation/flags", post(handlers::create_flag))
        .route("/moderation/queue", get(handlers::moderation_queue))
        .route("/moderation/review", post(handlers::submit_review))
        .route("/metrics", get(handlers::metrics))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
