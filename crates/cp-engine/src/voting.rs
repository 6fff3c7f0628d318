//! Vote casting.
//!
//! Casting is a read-modify-write on at most one row per (voter, content);
//! the store's upsert keeps it atomic under concurrent double-clicks.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use cp_core::config::WeightRules;
use cp_core::error::{EngineError, Result};
use cp_core::models::{ContentRef, Vote, VoteDirection};
use cp_core::traits::EngineStore;

use crate::aggregation::weight;
use crate::cache::AggregateCache;

/// What a cast request did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CastOutcome {
    Cast,
    Removed,
    /// direction 0 with no existing vote; nothing to remove.
    NoOp,
}

pub struct VotingService {
    store: Arc<dyn EngineStore>,
    rules: WeightRules,
    cache: Arc<AggregateCache>,
}

impl VotingService {
    pub fn new(store: Arc<dyn EngineStore>, rules: WeightRules, cache: Arc<AggregateCache>) -> Self {
        Self { store, rules, cache }
    }

    /// Casts, updates, or removes a vote. `direction` follows the wire
    /// convention: +1 up, −1 down, 0 remove.
    pub async fn cast(
        &self,
        voter_id: Uuid,
        content: ContentRef,
        direction: i64,
        quality_tags: BTreeSet<String>,
    ) -> Result<CastOutcome> {
        self.store
            .content_meta(content)
            .await?
            .ok_or_else(|| EngineError::NotFound("content", content.to_string()))?;

        let outcome = match direction {
            0 => {
                if self.store.remove_vote(voter_id, content).await? {
                    CastOutcome::Removed
                } else {
                    CastOutcome::NoOp
                }
            }
            d => {
                let direction = VoteDirection::from_value(d).ok_or_else(|| {
                    EngineError::Validation(format!("direction must be -1, 0 or +1, got {d}"))
                })?;
                let voter = self
                    .store
                    .get_user(voter_id)
                    .await?
                    .ok_or_else(|| EngineError::NotFound("user", voter_id.to_string()))?;
                let now = Utc::now();
                let vote = Vote {
                    voter_id,
                    content,
                    direction,
                    quality_tags,
                    // Audit snapshot of the weight at cast time; aggregation
                    // never reads it back.
                    weight_at_cast: weight(&self.rules, voter.trust_score),
                    created_at: now,
                    updated_at: now,
                };
                self.store.upsert_vote(vote).await?;
                CastOutcome::Cast
            }
        };

        // The aggregate for this item is stale now.
        self.cache.invalidate(content);
        debug!(%voter_id, %content, direction, ?outcome, "vote request handled");
        Ok(outcome)
    }
}
