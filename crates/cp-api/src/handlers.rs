//! # cp-api Handlers
//!
//! This module coordinates the flow between HTTP requests and the engine
//! services. The acting user arrives in the `x-user-id` header; session
//! handling itself belongs to the external auth system.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cp_core::error::EngineError;
use cp_core::models::{
    ContentRef, ContentType, FlagReason, ModerationFlag, ModerationReview, PenaltyType,
    QualitySignals, QueueItem, ReviewAction, ScoreAnomaly,
};
use cp_core::traits::EngineStore;
use cp_engine::{
    AggregateCache, AnomalyDetector, CastOutcome, ModerationWorkflow, ReviewRequest,
    TrustScoreLedger, VotingService,
};

use crate::error::ApiError;
use crate::metrics::Metrics;

/// State shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EngineStore>,
    pub ledger: Arc<TrustScoreLedger>,
    pub voting: Arc<VotingService>,
    pub cache: Arc<AggregateCache>,
    pub anomalies: Arc<AnomalyDetector>,
    pub moderation: Arc<ModerationWorkflow>,
    pub metrics: Arc<Metrics>,
}

/// Pulls the authenticated user id out of `x-user-id`.
fn acting_user(headers: &HeaderMap) -> Result<Uuid, ApiError> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok())
        .ok_or_else(|| {
            ApiError(EngineError::Unauthorized(
                "missing or malformed x-user-id header".to_string(),
            ))
        })
}

/// Moderator gate for the queue listing; `review()` re-checks on its own.
async fn require_moderator(state: &AppState, user_id: Uuid) -> Result<(), ApiError> {
    let user = state
        .store
        .get_user(user_id)
        .await?
        .ok_or_else(|| EngineError::NotFound("user", user_id.to_string()))?;
    if user.is_moderator() {
        Ok(())
    } else {
        Err(ApiError(EngineError::Unauthorized(
            "moderator role required".to_string(),
        )))
    }
}

#[derive(Debug, Deserialize)]
pub struct CastVoteRequest {
    pub content_type: ContentType,
    pub content_id: Uuid,
    /// +1 upvote, −1 downvote, 0 remove.
    pub direction: i64,
    #[serde(default)]
    pub quality_tags: BTreeSet<String>,
}

#[derive(Debug, Serialize)]
pub struct CastVoteResponse {
    pub outcome: &'static str,
    pub signals: QualitySignals,
}

pub async fn cast_vote(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CastVoteRequest>,
) -> Result<Json<CastVoteResponse>, ApiError> {
    let voter_id = acting_user(&headers)?;
    let content = ContentRef::new(req.content_type, req.content_id);
    let outcome = state
        .voting
        .cast(voter_id, content, req.direction, req.quality_tags)
        .await?;
    state.metrics.votes_cast.inc();

    // Fresh aggregate so the caller sees the effect of their own vote.
    let signals = state.cache.refresh(content).await?;
    Ok(Json(CastVoteResponse {
        outcome: match outcome {
            CastOutcome::Cast => "cast",
            CastOutcome::Removed => "removed",
            CastOutcome::NoOp => "noop",
        },
        signals,
    }))
}

pub async fn quality_signals(
    State(state): State<AppState>,
    Path((content_type, content_id)): Path<(ContentType, Uuid)>,
) -> Result<Json<QualitySignals>, ApiError> {
    let content = ContentRef::new(content_type, content_id);
    state
        .store
        .content_meta(content)
        .await?
        .ok_or_else(|| EngineError::NotFound("content", content.to_string()))?;
    let signals = state.cache.get_or_compute(content).await?;
    Ok(Json(signals))
}

#[derive(Debug, Deserialize)]
pub struct AnomalyQuery {
    pub threshold: Option<f64>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct AnomalyResponse {
    pub anomalies: Vec<ScoreAnomaly>,
}

pub async fn score_anomalies(
    State(state): State<AppState>,
    Query(query): Query<AnomalyQuery>,
) -> Result<Json<AnomalyResponse>, ApiError> {
    let threshold = query.threshold.ok_or_else(|| {
        ApiError(EngineError::Validation("threshold is required".to_string()))
    })?;
    let anomalies = state
        .anomalies
        .find_anomalies(threshold, query.limit.unwrap_or(50), query.offset.unwrap_or(0))
        .await?;
    state.metrics.anomaly_scans.inc();
    Ok(Json(AnomalyResponse { anomalies }))
}

#[derive(Debug, Deserialize, Default)]
pub struct RefreshCacheRequest {
    pub content_type: Option<ContentType>,
    pub content_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct RefreshCacheResponse {
    pub refreshed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signals: Option<QualitySignals>,
}

/// Forces a synchronous recompute: one aggregate when a key is named,
/// every warm aggregate otherwise.
pub async fn refresh_cache(
    State(state): State<AppState>,
    Json(req): Json<RefreshCacheRequest>,
) -> Result<Json<RefreshCacheResponse>, ApiError> {
    match (req.content_type, req.content_id) {
        (Some(content_type), Some(content_id)) => {
            let signals = state
                .cache
                .refresh(ContentRef::new(content_type, content_id))
                .await?;
            Ok(Json(RefreshCacheResponse { refreshed: 1, signals: Some(signals) }))
        }
        (None, None) => {
            let refreshed = state.cache.refresh_all().await?;
            Ok(Json(RefreshCacheResponse { refreshed, signals: None }))
        }
        _ => Err(ApiError(EngineError::Validation(
            "content_type and content_id must be supplied together".to_string(),
        ))),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateFlagRequest {
    pub content_type: ContentType,
    pub content_id: Uuid,
    pub reason: FlagReason,
    pub details: Option<String>,
}

pub async fn create_flag(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateFlagRequest>,
) -> Result<Json<ModerationFlag>, ApiError> {
    let reporter_id = acting_user(&headers)?;
    let flag = state
        .moderation
        .create_flag(
            reporter_id,
            ContentRef::new(req.content_type, req.content_id),
            req.reason,
            req.details,
        )
        .await?;
    state.metrics.flags_created.inc();
    Ok(Json(flag))
}

#[derive(Debug, Deserialize)]
pub struct QueueQuery {
    pub content_type: Option<ContentType>,
    pub reason: Option<FlagReason>,
}

#[derive(Debug, Serialize)]
pub struct QueueResponse {
    pub items: Vec<QueueItem>,
}

pub async fn moderation_queue(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<QueueQuery>,
) -> Result<Json<QueueResponse>, ApiError> {
    let user_id = acting_user(&headers)?;
    require_moderator(&state, user_id).await?;
    let items = state
        .moderation
        .get_queue(query.content_type, query.reason)
        .await?;
    Ok(Json(QueueResponse { items }))
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequestBody {
    pub flag_ids: Vec<Uuid>,
    pub action: ReviewAction,
    pub notes: Option<String>,
    #[serde(default)]
    pub issue_penalty: bool,
    pub penalty_type: Option<PenaltyType>,
    pub penalty_reason: Option<String>,
}

pub async fn submit_review(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ReviewRequestBody>,
) -> Result<Json<ModerationReview>, ApiError> {
    let reviewer_id = acting_user(&headers)?;
    let review = state
        .moderation
        .review(
            reviewer_id,
            ReviewRequest {
                flag_ids: req.flag_ids,
                action: req.action,
                notes: req.notes,
                issue_penalty: req.issue_penalty,
                penalty_type: req.penalty_type,
                penalty_reason: req.penalty_reason,
            },
        )
        .await?;
    state.metrics.reviews_committed.inc();
    Ok(Json(review))
}

pub async fn metrics(State(state): State<AppState>) -> String {
    state.metrics.render()
}

pub async fn health() -> &'static str {
    "ok"
}
