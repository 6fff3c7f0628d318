//! Aggregate cache.
//!
//! Read-mostly aggregates are served from a per-content cache refreshed on a
//! fixed interval; callers can force a synchronous recompute for one key and
//! receive the freshly computed value. `computed_at` on the aggregate
//! discloses staleness to the caller.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{debug, warn};

use cp_core::error::Result;
use cp_core::models::{ContentRef, QualitySignals};

use crate::aggregation::VoteAggregationEngine;

pub struct AggregateCache {
    aggregator: Arc<VoteAggregationEngine>,
    entries: DashMap<ContentRef, QualitySignals>,
}

impl AggregateCache {
    pub fn new(aggregator: Arc<VoteAggregationEngine>) -> Self {
        Self { aggregator, entries: DashMap::new() }
    }

    /// Serves a warm entry, computing and caching it on a miss.
    pub async fn get_or_compute(&self, content: ContentRef) -> Result<QualitySignals> {
        if let Some(entry) = self.entries.get(&content) {
            return Ok(entry.clone());
        }
        self.refresh(content).await
    }

    /// Bypasses the cache: recomputes the aggregate and stores it.
    pub async fn refresh(&self, content: ContentRef) -> Result<QualitySignals> {
        let signals = self.aggregator.aggregate(content).await?;
        self.entries.insert(content, signals.clone());
        Ok(signals)
    }

    /// Recomputes every warm key. Returns the number of refreshed entries.
    pub async fn refresh_all(&self) -> Result<usize> {
        let keys: Vec<ContentRef> = self.entries.iter().map(|e| *e.key()).collect();
        let count = keys.len();
        for key in keys {
            self.refresh(key).await?;
        }
        Ok(count)
    }

    /// Drops one entry; the next read recomputes.
    pub fn invalidate(&self, content: ContentRef) {
        self.entries.remove(&content);
    }

    /// Background refresh loop; spawned by the binary.
    pub async fn run_refresh_loop(self: Arc<Self>, period: Duration) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match self.refresh_all().await {
                Ok(count) => debug!(count, "refreshed aggregate cache"),
                Err(err) => warn!(%err, "aggregate cache refresh failed"),
            }
        }
    }
}
