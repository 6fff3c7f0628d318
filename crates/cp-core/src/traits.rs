//! # Core Traits (Ports)
//!
//! Any storage or notification adapter must implement these traits to be
//! used by the binary.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    ContentMeta, ContentRef, ContentStatus, ContentType, FlagReason, ModerationFlag,
    ModerationReview, PenaltyType, QueueItem, ScoreAnomaly, TrustCause, TrustEvent, User, Vote,
};

/// Result of inserting a flag, with the auto-hide decision taken inside the
/// same transaction.
#[derive(Debug, Clone)]
pub struct FlagInsertOutcome {
    pub flag: ModerationFlag,
    /// Distinct reporters with unreviewed flags on the content, after insert.
    pub distinct_reporters: u64,
    /// True when this insert pushed the content over the auto-hide threshold.
    pub auto_hidden: bool,
}

/// Penalty to record inside a review commit transaction.
#[derive(Debug, Clone)]
pub struct PenaltyDraft {
    pub user_id: Uuid,
    pub kind: PenaltyType,
    pub reason: String,
    pub issued_by: Uuid,
    /// Signed (negative) delta to apply to the user's trust score.
    pub trust_delta: f64,
}

/// Persistence contract for trust scores, votes, flags, and reviews.
///
/// Grouped into one port the way a relational adapter owns the whole
/// schema; composite operations are atomic transactions inside the adapter.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait EngineStore: Send + Sync {
    // Trust operations
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>>;
    /// Applies a clamped, atomic increment and records the ledger event in
    /// one transaction. Returns the score after clamping.
    async fn apply_trust_delta(&self, user_id: Uuid, delta: f64, cause: TrustCause)
        -> Result<f64>;
    async fn trust_events(&self, user_id: Uuid) -> Result<Vec<TrustEvent>>;

    // Vote operations
    /// Insert-or-update keyed on (voter, content); atomic.
    async fn upsert_vote(&self, vote: Vote) -> Result<Vote>;
    /// Returns true when an active vote existed and was removed.
    async fn remove_vote(&self, voter_id: Uuid, content: ContentRef) -> Result<bool>;
    /// Active votes joined with each voter's live trust score.
    async fn votes_with_trust(&self, content: ContentRef) -> Result<Vec<(Vote, f64)>>;
    /// Distinct content refs with at least one active vote, ordered.
    async fn voted_content(&self) -> Result<Vec<ContentRef>>;

    // Content operations (the engine's view of the external content store)
    async fn content_meta(&self, content: ContentRef) -> Result<Option<ContentMeta>>;

    // Flag / review operations
    /// One transaction: duplicate check, insert, distinct-reporter count,
    /// conditional auto-hide once the count reaches `auto_hide_threshold`.
    async fn insert_flag(
        &self,
        flag: ModerationFlag,
        auto_hide_threshold: u64,
    ) -> Result<FlagInsertOutcome>;
    async fn flags_by_ids(&self, flag_ids: Vec<Uuid>) -> Result<Vec<ModerationFlag>>;
    /// Queue items for content with at least one unreviewed flag.
    async fn open_queue(
        &self,
        content_type: Option<ContentType>,
        reason: Option<FlagReason>,
    ) -> Result<Vec<QueueItem>>;
    /// One transaction: optimistic `reviewed = false` guard over every flag
    /// in the review, review insert, optional status write, optional penalty
    /// row plus clamped trust decrement. All-or-nothing.
    async fn commit_review(
        &self,
        review: ModerationReview,
        new_status: Option<ContentStatus>,
        penalty: Option<PenaltyDraft>,
    ) -> Result<ModerationReview>;
}

/// Fire-and-forget event sink. Failures are logged, never awaited for
/// success, and never roll back the engine's transaction.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn flag_created(&self, flag: &ModerationFlag);
    async fn content_auto_hidden(&self, content: ContentRef, distinct_reporters: u64);
    async fn anomaly_detected(&self, anomaly: &ScoreAnomaly);
}
