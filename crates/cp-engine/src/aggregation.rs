//! Vote aggregation.
//!
//! Computes, for one content item, the raw score, the trust-weighted score,
//! per-quality-tag upvote counts, and the voter trust-tier distribution.
//! Pure read over current vote and user state: weighting always uses live
//! trust scores, never the `weight_at_cast` audit snapshot.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;

use cp_core::config::WeightRules;
use cp_core::error::Result;
use cp_core::models::{ContentRef, QualitySignals, TrustDistribution, Vote, VoteDirection};
use cp_core::traits::EngineStore;

/// Weight of a vote cast by a voter with the given trust score:
/// `clamp(trust / pivot, floor, cap)`.
///
/// A baseline-trust voter (50) has weight 1.0. The floor guarantees no
/// voter's input is ever fully discarded; the cap keeps one high-trust
/// voter from dominating.
pub fn weight(rules: &WeightRules, trust_score: f64) -> f64 {
    (trust_score / rules.pivot).clamp(rules.floor, rules.cap)
}

/// Trust tier a voter falls into: low <33, medium 33–66, high >66.
fn bump_tier(dist: &mut TrustDistribution, trust_score: f64) {
    if trust_score < 33.0 {
        dist.low += 1;
    } else if trust_score <= 66.0 {
        dist.medium += 1;
    } else {
        dist.high += 1;
    }
}

/// Folds active votes (paired with each voter's live trust score) into one
/// aggregate. Pure; the service below feeds it from the store.
pub fn aggregate_votes(
    rules: &WeightRules,
    content: ContentRef,
    votes: &[(Vote, f64)],
) -> QualitySignals {
    let mut raw_score: i64 = 0;
    let mut weighted_score: f64 = 0.0;
    let mut quality_counts: BTreeMap<String, u64> = BTreeMap::new();
    let mut trust_distribution = TrustDistribution::default();

    for (vote, trust) in votes {
        let direction = vote.direction.value();
        raw_score += direction;
        weighted_score += direction as f64 * weight(rules, *trust);
        bump_tier(&mut trust_distribution, *trust);
        if vote.direction == VoteDirection::Up {
            for tag in &vote.quality_tags {
                *quality_counts.entry(tag.clone()).or_insert(0) += 1;
            }
        }
    }

    QualitySignals {
        content,
        raw_score,
        weighted_score,
        quality_counts,
        trust_distribution,
        computed_at: Utc::now(),
    }
}

pub struct VoteAggregationEngine {
    store: Arc<dyn EngineStore>,
    rules: WeightRules,
}

impl VoteAggregationEngine {
    pub fn new(store: Arc<dyn EngineStore>, rules: WeightRules) -> Self {
        Self { store, rules }
    }

    pub fn rules(&self) -> &WeightRules {
        &self.rules
    }

    /// Aggregates the item's active votes. Tolerates zero votes: every
    /// output is zero and the tag map is empty.
    pub async fn aggregate(&self, content: ContentRef) -> Result<QualitySignals> {
        let votes = self.store.votes_with_trust(content).await?;
        Ok(aggregate_votes(&self.rules, content, &votes))
    }
}
