//! Anomaly detection.
//!
//! Recomputes, on demand, the divergence between raw and trust-weighted
//! scores across all voted content and surfaces the items whose divergence
//! clears a caller-supplied threshold. Every scan recomputes aggregates
//! from live store state (rewarming the shared cache as a side effect),
//! so trust changes since the last scan are always reflected.

use std::sync::Arc;

use tracing::debug;

use cp_core::error::{EngineError, Result};
use cp_core::models::ScoreAnomaly;
use cp_core::traits::{EngineStore, Notifier};

use crate::cache::AggregateCache;

/// `(weighted − raw) / max(1, |raw|) × 100`.
///
/// The `max(1, |raw|)` guard avoids division by zero: at raw = 0 this
/// reduces to `weighted × 100`, which is intentional: any nonzero weighted
/// deviation from a net-zero raw tally is itself a signal.
pub fn divergence_percent(raw_score: i64, weighted_score: f64) -> f64 {
    (weighted_score - raw_score as f64) / (raw_score.abs().max(1) as f64) * 100.0
}

pub struct AnomalyDetector {
    store: Arc<dyn EngineStore>,
    cache: Arc<AggregateCache>,
    notifier: Arc<dyn Notifier>,
}

impl AnomalyDetector {
    pub fn new(
        store: Arc<dyn EngineStore>,
        cache: Arc<AggregateCache>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            cache,
            notifier,
        }
    }

    /// Finds content whose |divergence| ≥ threshold × 100, ordered by
    /// |divergence| descending with content-key ties ascending, then paged.
    /// Surfaced anomalies are announced through the notifier without
    /// blocking the response.
    ///
    /// `threshold` is a fraction in [0, 1].
    pub async fn find_anomalies(
        &self,
        threshold: f64,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ScoreAnomaly>> {
        if !(0.0..=1.0).contains(&threshold) || threshold.is_nan() {
            return Err(EngineError::InvalidThreshold(threshold));
        }

        let cutoff = threshold * 100.0;
        let mut anomalies = Vec::new();
        for content in self.store.voted_content().await? {
            // Refresh rather than read through: a cached aggregate may
            // predate a trust change and would mask the real divergence.
            let signals = self.cache.refresh(content).await?;
            let divergence = divergence_percent(signals.raw_score, signals.weighted_score);
            if divergence.abs() >= cutoff {
                anomalies.push(ScoreAnomaly {
                    content,
                    raw_score: signals.raw_score,
                    weighted_score: signals.weighted_score,
                    divergence_percent: divergence,
                });
            }
        }

        // Largest anomalies first; ties broken by content key for
        // deterministic paging.
        anomalies.sort_by(|a, b| {
            b.divergence_percent
                .abs()
                .partial_cmp(&a.divergence_percent.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.content.cmp(&b.content))
        });

        debug!(threshold, total = anomalies.len(), "anomaly scan complete");
        let page: Vec<ScoreAnomaly> = anomalies.into_iter().skip(offset).take(limit).collect();

        if !page.is_empty() {
            let notifier = self.notifier.clone();
            let surfaced = page.clone();
            tokio::spawn(async move {
                for anomaly in &surfaced {
                    notifier.anomaly_detected(anomaly).await;
                }
            });
        }

        Ok(page)
    }
}
