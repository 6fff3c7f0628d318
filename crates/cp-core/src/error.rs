//! # EngineError
//!
//! Centralized error handling for the engine.
//! Maps domain-specific failures to actionable error types.

use thiserror::Error;
use uuid::Uuid;

use crate::models::ContentRef;

/// The primary error type for all engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Anomaly threshold outside the [0, 1] fraction range.
    #[error("invalid threshold {0}: must be a fraction in [0, 1]")]
    InvalidThreshold(f64),

    /// Review batch is empty, names unknown flags, or spans several contents.
    #[error("invalid review scope: {0}")]
    InvalidReviewScope(String),

    /// Generic request validation failure (e.g. bad direction value).
    #[error("validation error: {0}")]
    Validation(String),

    /// The reporter already has an unreviewed flag on this content.
    #[error("reporter {reporter_id} already has an active flag on {content}")]
    DuplicateFlag { reporter_id: Uuid, content: ContentRef },

    /// A flag in the batch lost the race to a concurrent reviewer.
    #[error("flag {flag_id} is already reviewed")]
    AlreadyReviewed { flag_id: Uuid },

    /// Optimistic concurrency check failed; the caller may retry.
    #[error("concurrent modification: {0}")]
    ConcurrentModification(String),

    /// Resource not found (e.g. user, content, flag).
    #[error("{0} not found: {1}")]
    NotFound(&'static str, String),

    /// Acting user lacks the moderator role.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Invariant violation: a trust score escaped [0, 100] despite clamping.
    /// Fatal, aborts the triggering transaction; never clamped away after
    /// the fact.
    #[error("trust score {score} for user {user_id} is out of range")]
    TrustScoreOutOfRange { user_id: Uuid, score: f64 },

    /// Infrastructure failure (e.g. database down).
    #[error("internal service error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Conflict errors are rejected with no partial effect; only
    /// `ConcurrentModification` is safe to retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::ConcurrentModification(_))
    }
}

/// A specialized Result type for engine logic.
pub type Result<T> = std::result::Result<T, EngineError>;
