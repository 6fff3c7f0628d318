//! Trust score ledger.
//!
//! The single owner of every trust-score mutation. Deltas are applied as
//! atomic clamped increments in the store and logged as append-only
//! `TrustEvent` rows, so the current score is reconstructible as
//! baseline + Σ(deltas) while staying O(1) to read.

use std::sync::Arc;

use tracing::{debug, error};
use uuid::Uuid;

use cp_core::config::TrustRules;
use cp_core::error::{EngineError, Result};
use cp_core::models::{
    PenaltyType, TrustCause, TrustEvent, TRUST_SCORE_MAX, TRUST_SCORE_MIN,
};
use cp_core::traits::EngineStore;

/// Content lifecycle outcomes that feed the ledger. The approval workflow
/// itself is external; it calls in through here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentOutcome {
    IdeaApproved,
    IdeaRejected,
}

pub struct TrustScoreLedger {
    store: Arc<dyn EngineStore>,
    rules: TrustRules,
}

impl TrustScoreLedger {
    pub fn new(store: Arc<dyn EngineStore>, rules: TrustRules) -> Self {
        Self { store, rules }
    }

    /// Pure read of a user's current trust score.
    pub async fn get_score(&self, user_id: Uuid) -> Result<f64> {
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("user", user_id.to_string()))?;
        Ok(user.trust_score)
    }

    /// Applies a bounded delta and returns the new score.
    ///
    /// Clamping to [0, 100] happens inside the store's single UPDATE
    /// statement; a result outside that range means the clamp was bypassed
    /// and is a fatal invariant violation, never silently corrected here.
    pub async fn apply_delta(&self, user_id: Uuid, delta: f64, cause: TrustCause) -> Result<f64> {
        let score = self.store.apply_trust_delta(user_id, delta, cause).await?;
        if !(TRUST_SCORE_MIN..=TRUST_SCORE_MAX).contains(&score) {
            error!(%user_id, score, delta, ?cause, "trust score escaped its bounds");
            return Err(EngineError::TrustScoreOutOfRange { user_id, score });
        }
        debug!(%user_id, delta, score, cause = cause.as_str(), "applied trust delta");
        Ok(score)
    }

    /// Applies the configured delta for an idea approval or rejection.
    pub async fn record_content_outcome(
        &self,
        author_id: Uuid,
        outcome: ContentOutcome,
    ) -> Result<f64> {
        let (delta, cause) = match outcome {
            ContentOutcome::IdeaApproved => (self.rules.idea_approved, TrustCause::IdeaApproved),
            ContentOutcome::IdeaRejected => (self.rules.idea_rejected, TrustCause::IdeaRejected),
        };
        self.apply_delta(author_id, delta, cause).await
    }

    /// The signed delta the configured table assigns to a penalty kind.
    pub fn penalty_delta(&self, kind: PenaltyType) -> f64 {
        self.rules.penalty_delta(kind)
    }

    /// Audit trail of every delta applied to a user.
    pub async fn history(&self, user_id: Uuid) -> Result<Vec<TrustEvent>> {
        self.store.trust_events(user_id).await
    }
}
