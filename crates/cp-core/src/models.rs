//! # Domain Models
//!
//! These structs represent the core entities of the voting-integrity and
//! moderation engine. We use UUID v7 for time-ordered, globally unique
//! identification.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Trust score assigned to freshly registered accounts.
pub const DEFAULT_TRUST_SCORE: f64 = 50.0;
/// Lower bound of the trust score range.
pub const TRUST_SCORE_MIN: f64 = 0.0;
/// Upper bound of the trust score range.
pub const TRUST_SCORE_MAX: f64 = 100.0;

/// A platform account as the engine sees it.
///
/// `trust_score` is owned by the trust ledger; nothing else writes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Bounded reputation value, invariant `0.0 <= trust_score <= 100.0`.
    pub trust_score: f64,
    pub is_global_admin: bool,
    pub is_official: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_moderator(&self) -> bool {
        self.is_global_admin || self.is_official
    }
}

/// The two kinds of content citizens can vote on and flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Idea,
    Comment,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Idea => "idea",
            ContentType::Comment => "comment",
        }
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idea" => Ok(ContentType::Idea),
            "comment" => Ok(ContentType::Comment),
            other => Err(format!("unknown content type: {other}")),
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared identity every vote, flag, and queue item keys on.
///
/// Ordered by type then id so listings are deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContentRef {
    pub content_type: ContentType,
    pub content_id: Uuid,
}

impl ContentRef {
    pub fn new(content_type: ContentType, content_id: Uuid) -> Self {
        Self { content_type, content_id }
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.content_type, self.content_id)
    }
}

/// Lifecycle status of a content item.
///
/// The engine only ever writes `Hidden` and `Deleted`, and never moves an
/// item backward out of those two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    Pending,
    Approved,
    Rejected,
    Hidden,
    Deleted,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStatus::Pending => "pending",
            ContentStatus::Approved => "approved",
            ContentStatus::Rejected => "rejected",
            ContentStatus::Hidden => "hidden",
            ContentStatus::Deleted => "deleted",
        }
    }

    /// Hidden and Deleted are terminal as far as this engine is concerned.
    pub fn is_removed(&self) -> bool {
        matches!(self, ContentStatus::Hidden | ContentStatus::Deleted)
    }
}

impl FromStr for ContentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ContentStatus::Pending),
            "approved" => Ok(ContentStatus::Approved),
            "rejected" => Ok(ContentStatus::Rejected),
            "hidden" => Ok(ContentStatus::Hidden),
            "deleted" => Ok(ContentStatus::Deleted),
            other => Err(format!("unknown content status: {other}")),
        }
    }
}

/// The slice of the external content store the engine reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentMeta {
    pub content: ContentRef,
    pub author_id: Uuid,
    pub status: ContentStatus,
}

/// Direction of a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    /// The signed contribution to the raw score.
    pub fn value(&self) -> i64 {
        match self {
            VoteDirection::Up => 1,
            VoteDirection::Down => -1,
        }
    }

    pub fn from_value(v: i64) -> Option<Self> {
        match v {
            1 => Some(VoteDirection::Up),
            -1 => Some(VoteDirection::Down),
            _ => None,
        }
    }
}

/// A single active vote.
///
/// At most one per (voter, content); re-casting updates the row in place.
/// `weight_at_cast` is an audit snapshot only; aggregation always uses the
/// voter's live trust score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub voter_id: Uuid,
    pub content: ContentRef,
    pub direction: VoteDirection,
    pub quality_tags: BTreeSet<String>,
    pub weight_at_cast: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Why a piece of content was reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagReason {
    Spam,
    Harassment,
    Misinformation,
    OffTopic,
    Other,
}

impl FlagReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagReason::Spam => "spam",
            FlagReason::Harassment => "harassment",
            FlagReason::Misinformation => "misinformation",
            FlagReason::OffTopic => "off_topic",
            FlagReason::Other => "other",
        }
    }
}

impl FromStr for FlagReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spam" => Ok(FlagReason::Spam),
            "harassment" => Ok(FlagReason::Harassment),
            "misinformation" => Ok(FlagReason::Misinformation),
            "off_topic" => Ok(FlagReason::OffTopic),
            "other" => Ok(FlagReason::Other),
            other => Err(format!("unknown flag reason: {other}")),
        }
    }
}

/// A single user's abuse report against one piece of content.
///
/// `reviewed` is monotonic false → true; a reviewed flag carries the id of
/// the review that resolved it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationFlag {
    pub id: Uuid,
    pub reporter_id: Uuid,
    pub content: ContentRef,
    pub reason: FlagReason,
    pub details: Option<String>,
    pub reviewed: bool,
    pub review_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// The reviewer's verdict over a batch of flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewAction {
    Dismiss,
    Action,
}

impl ReviewAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewAction::Dismiss => "dismiss",
            ReviewAction::Action => "action",
        }
    }
}

impl FromStr for ReviewAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dismiss" => Ok(ReviewAction::Dismiss),
            "action" => Ok(ReviewAction::Action),
            other => Err(format!("unknown review action: {other}")),
        }
    }
}

/// Immutable record of one review decision and the flags it resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationReview {
    pub id: Uuid,
    pub content: ContentRef,
    pub flag_ids: Vec<Uuid>,
    pub action: ReviewAction,
    pub notes: Option<String>,
    pub reviewer_id: Uuid,
    pub penalty_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Severity ladder for punitive actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyType {
    Warning,
    ContentRemoved,
    TemporaryRestriction,
    PermanentRestriction,
}

impl PenaltyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PenaltyType::Warning => "warning",
            PenaltyType::ContentRemoved => "content_removed",
            PenaltyType::TemporaryRestriction => "temporary_restriction",
            PenaltyType::PermanentRestriction => "permanent_restriction",
        }
    }

    /// Penalties severe enough that acting on them deletes the content
    /// rather than hiding it.
    pub fn removes_content(&self) -> bool {
        matches!(
            self,
            PenaltyType::ContentRemoved | PenaltyType::PermanentRestriction
        )
    }
}

impl FromStr for PenaltyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "warning" => Ok(PenaltyType::Warning),
            "content_removed" => Ok(PenaltyType::ContentRemoved),
            "temporary_restriction" => Ok(PenaltyType::TemporaryRestriction),
            "permanent_restriction" => Ok(PenaltyType::PermanentRestriction),
            other => Err(format!("unknown penalty type: {other}")),
        }
    }
}

/// One issued penalty, with the trust delta that was actually applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Penalty {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: PenaltyType,
    pub reason: String,
    pub issued_by: Uuid,
    /// Signed delta applied to the author's trust score (negative).
    pub trust_delta: f64,
    pub created_at: DateTime<Utc>,
}

/// What caused a trust-score delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustCause {
    IdeaApproved,
    IdeaRejected,
    Penalty(PenaltyType),
    Manual,
}

impl TrustCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrustCause::IdeaApproved => "idea_approved",
            TrustCause::IdeaRejected => "idea_rejected",
            TrustCause::Penalty(PenaltyType::Warning) => "penalty_warning",
            TrustCause::Penalty(PenaltyType::ContentRemoved) => "penalty_content_removed",
            TrustCause::Penalty(PenaltyType::TemporaryRestriction) => {
                "penalty_temporary_restriction"
            }
            TrustCause::Penalty(PenaltyType::PermanentRestriction) => {
                "penalty_permanent_restriction"
            }
            TrustCause::Manual => "manual",
        }
    }
}

impl FromStr for TrustCause {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idea_approved" => Ok(TrustCause::IdeaApproved),
            "idea_rejected" => Ok(TrustCause::IdeaRejected),
            "penalty_warning" => Ok(TrustCause::Penalty(PenaltyType::Warning)),
            "penalty_content_removed" => Ok(TrustCause::Penalty(PenaltyType::ContentRemoved)),
            "penalty_temporary_restriction" => {
                Ok(TrustCause::Penalty(PenaltyType::TemporaryRestriction))
            }
            "penalty_permanent_restriction" => {
                Ok(TrustCause::Penalty(PenaltyType::PermanentRestriction))
            }
            "manual" => Ok(TrustCause::Manual),
            other => Err(format!("unknown trust cause: {other}")),
        }
    }
}

/// Append-only ledger entry behind every trust-score change.
///
/// The live score is reconstructible as baseline + the sum of deltas, but the
/// current value is also cached on the user row for O(1) reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub delta: f64,
    pub score_after: f64,
    pub cause: TrustCause,
    pub created_at: DateTime<Utc>,
}

/// Vote counts per trust tier, for transparency displays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustDistribution {
    /// Voters with trust below 33.
    pub low: u64,
    /// Voters with trust in [33, 66].
    pub medium: u64,
    /// Voters with trust above 66.
    pub high: u64,
}

/// Output of the vote aggregation engine for one content item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualitySignals {
    pub content: ContentRef,
    pub raw_score: i64,
    pub weighted_score: f64,
    /// Per-tag count of upvotes carrying that tag.
    pub quality_counts: BTreeMap<String, u64>,
    pub trust_distribution: TrustDistribution,
    /// When this aggregate was computed; discloses cache staleness.
    pub computed_at: DateTime<Utc>,
}

impl QualitySignals {
    /// The all-zero aggregate for content with no active votes.
    pub fn empty(content: ContentRef) -> Self {
        Self {
            content,
            raw_score: 0,
            weighted_score: 0.0,
            quality_counts: BTreeMap::new(),
            trust_distribution: TrustDistribution::default(),
            computed_at: Utc::now(),
        }
    }
}

/// One anomalous raw/weighted divergence, surfaced by the detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreAnomaly {
    pub content: ContentRef,
    pub raw_score: i64,
    pub weighted_score: f64,
    pub divergence_percent: f64,
}

/// Aggregation of all unreviewed flags against one content item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub content: ContentRef,
    pub flag_count: u64,
    pub distinct_reporters: u64,
    pub is_hidden: bool,
    pub author_id: Uuid,
    pub author_trust_score: f64,
    pub flags: Vec<ModerationFlag>,
}
