//! Default notifier.
//!
//! Real deployments hook the platform's notification system in through the
//! `Notifier` port; this implementation just logs the events so the engine
//! is observable on its own.

use async_trait::async_trait;
use tracing::info;

use cp_core::models::{ContentRef, ModerationFlag, ScoreAnomaly};
use cp_core::traits::Notifier;

#[derive(Debug, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn flag_created(&self, flag: &ModerationFlag) {
        info!(
            flag_id = %flag.id,
            content = %flag.content,
            reason = flag.reason.as_str(),
            "flag created"
        );
    }

    async fn content_auto_hidden(&self, content: ContentRef, distinct_reporters: u64) {
        info!(%content, distinct_reporters, "content auto-hidden");
    }

    async fn anomaly_detected(&self, anomaly: &ScoreAnomaly) {
        info!(
            content = %anomaly.content,
            divergence = anomaly.divergence_percent,
            "score anomaly detected"
        );
    }
}
