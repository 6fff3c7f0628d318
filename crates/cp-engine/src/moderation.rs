//! Moderation workflow.
//!
//! Aggregates abuse flags per content item into a review queue, applies the
//! auto-hide policy, and executes the dismiss/action review state machine.
//! The per-item state (Open → possibly Auto-hidden → Resolved) is realized
//! through the flag rows themselves: an item is open while it has at least
//! one unreviewed flag, and a fresh flag after resolution reopens it.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use cp_core::config::EngineConfig;
use cp_core::error::{EngineError, Result};
use cp_core::models::{
    ContentRef, ContentStatus, ContentType, FlagReason, ModerationFlag, ModerationReview,
    PenaltyType, QueueItem, ReviewAction,
};
use cp_core::traits::{EngineStore, Notifier, PenaltyDraft};

use crate::ledger::TrustScoreLedger;

/// Everything a review request carries besides the acting reviewer.
#[derive(Debug, Clone)]
pub struct ReviewRequest {
    pub flag_ids: Vec<Uuid>,
    pub action: ReviewAction,
    pub notes: Option<String>,
    pub issue_penalty: bool,
    pub penalty_type: Option<PenaltyType>,
    pub penalty_reason: Option<String>,
}

pub struct ModerationWorkflow {
    store: Arc<dyn EngineStore>,
    ledger: Arc<TrustScoreLedger>,
    notifier: Arc<dyn Notifier>,
    auto_hide_threshold: u64,
    unhide_on_dismiss: bool,
    /// Serializes flag creation and review per content item within the
    /// process; the store's optimistic guard covers the rest.
    locks: DashMap<ContentRef, Arc<Mutex<()>>>,
}

impl ModerationWorkflow {
    pub fn new(
        store: Arc<dyn EngineStore>,
        ledger: Arc<TrustScoreLedger>,
        notifier: Arc<dyn Notifier>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            notifier,
            auto_hide_threshold: config.auto_hide_threshold,
            unhide_on_dismiss: config.unhide_on_dismiss,
            locks: DashMap::new(),
        }
    }

    fn content_lock(&self, content: ContentRef) -> Arc<Mutex<()>> {
        self.locks
            .entry(content)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drops our handle and evicts the map entry once no other task holds
    /// it, so the lock map does not grow with every content item ever
    /// flagged or reviewed. A task that cloned the entry in the meantime
    /// keeps the count above one and the entry stays.
    fn release_lock(&self, content: ContentRef, lock: Arc<Mutex<()>>) {
        drop(lock);
        self.locks
            .remove_if(&content, |_, entry| Arc::strong_count(entry) == 1);
    }

    /// Files an abuse report. A second unreviewed flag from the same
    /// reporter on the same content fails with `DuplicateFlag`; the
    /// auto-hide policy is re-evaluated inside the insert transaction.
    pub async fn create_flag(
        &self,
        reporter_id: Uuid,
        content: ContentRef,
        reason: FlagReason,
        details: Option<String>,
    ) -> Result<ModerationFlag> {
        self.store
            .content_meta(content)
            .await?
            .ok_or_else(|| EngineError::NotFound("content", content.to_string()))?;

        let lock = self.content_lock(content);
        let _guard = lock.lock().await;

        let flag = ModerationFlag {
            id: Uuid::now_v7(),
            reporter_id,
            content,
            reason,
            details,
            reviewed: false,
            review_id: None,
            created_at: chrono::Utc::now(),
        };
        let outcome = self.store.insert_flag(flag, self.auto_hide_threshold).await;
        drop(_guard);
        self.release_lock(content, lock);
        let outcome = outcome?;

        if outcome.auto_hidden {
            info!(
                %content,
                reporters = outcome.distinct_reporters,
                "auto-hid content pending review"
            );
        }

        // Fire-and-forget: notification failure never unwinds the flag.
        let notifier = self.notifier.clone();
        let notify_flag = outcome.flag.clone();
        let reporters = outcome.distinct_reporters;
        let auto_hidden = outcome.auto_hidden;
        tokio::spawn(async move {
            notifier.flag_created(&notify_flag).await;
            if auto_hidden {
                notifier.content_auto_hidden(content, reporters).await;
            }
        });

        Ok(outcome.flag)
    }

    /// Open queue items (≥1 unreviewed flag), optionally filtered.
    pub async fn get_queue(
        &self,
        content_type: Option<ContentType>,
        reason: Option<FlagReason>,
    ) -> Result<Vec<QueueItem>> {
        self.store.open_queue(content_type, reason).await
    }

    /// Executes one review decision over a batch of flags.
    ///
    /// Validation, then a single atomic commit: flags marked reviewed,
    /// optional status change, optional penalty with its ledger decrement.
    /// A batch that lost the race to a concurrent reviewer fails with
    /// `AlreadyReviewed` and no partial effect.
    pub async fn review(&self, reviewer_id: Uuid, request: ReviewRequest) -> Result<ModerationReview> {
        let reviewer = self
            .store
            .get_user(reviewer_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("user", reviewer_id.to_string()))?;
        if !reviewer.is_moderator() {
            return Err(EngineError::Unauthorized(
                "review requires a moderator role".to_string(),
            ));
        }

        let content = self.validate_scope(&request).await?;
        let meta = self
            .store
            .content_meta(content)
            .await?
            .ok_or_else(|| EngineError::NotFound("content", content.to_string()))?;

        let penalty = self.build_penalty(&request, meta.author_id, reviewer_id)?;
        let new_status = match request.action {
            ReviewAction::Dismiss => {
                // Dismissal never restores visibility unless explicitly
                // configured; un-hiding is otherwise a separate action.
                if self.unhide_on_dismiss && meta.status == ContentStatus::Hidden {
                    Some(ContentStatus::Approved)
                } else {
                    None
                }
            }
            ReviewAction::Action => {
                let removes = penalty
                    .as_ref()
                    .map(|p| p.kind.removes_content())
                    .unwrap_or(false);
                Some(if removes { ContentStatus::Deleted } else { ContentStatus::Hidden })
            }
        };

        let review = ModerationReview {
            id: Uuid::now_v7(),
            content,
            flag_ids: request.flag_ids.clone(),
            action: request.action,
            notes: request.notes.clone(),
            reviewer_id,
            penalty_id: None, // assigned by the store inside the commit
            created_at: chrono::Utc::now(),
        };

        let lock = self.content_lock(content);
        let _guard = lock.lock().await;
        let committed = self.store.commit_review(review, new_status, penalty).await;
        drop(_guard);
        self.release_lock(content, lock);
        let committed = committed?;

        info!(
            review_id = %committed.id,
            %content,
            action = committed.action.as_str(),
            flags = committed.flag_ids.len(),
            penalty = committed.penalty_id.is_some(),
            "review committed"
        );
        Ok(committed)
    }

    /// Checks the batch is non-empty, names only known unreviewed flags, and
    /// stays within a single content item. Returns that item.
    async fn validate_scope(&self, request: &ReviewRequest) -> Result<ContentRef> {
        if request.flag_ids.is_empty() {
            return Err(EngineError::InvalidReviewScope("no flags named".to_string()));
        }
        let mut deduped = request.flag_ids.clone();
        deduped.sort_unstable();
        deduped.dedup();
        if deduped.len() != request.flag_ids.len() {
            return Err(EngineError::InvalidReviewScope(
                "duplicate flag ids in batch".to_string(),
            ));
        }

        let flags = self.store.flags_by_ids(request.flag_ids.clone()).await?;
        if flags.len() != request.flag_ids.len() {
            return Err(EngineError::InvalidReviewScope(
                "batch names unknown flags".to_string(),
            ));
        }
        let content = flags[0].content;
        if flags.iter().any(|f| f.content != content) {
            return Err(EngineError::InvalidReviewScope(
                "batch spans multiple content items".to_string(),
            ));
        }
        // Early rejection; the commit transaction re-verifies under the
        // optimistic guard.
        if let Some(flag) = flags.iter().find(|f| f.reviewed) {
            warn!(flag_id = %flag.id, "review batch includes an already-reviewed flag");
            return Err(EngineError::AlreadyReviewed { flag_id: flag.id });
        }
        Ok(content)
    }

    fn build_penalty(
        &self,
        request: &ReviewRequest,
        author_id: Uuid,
        reviewer_id: Uuid,
    ) -> Result<Option<PenaltyDraft>> {
        if !request.issue_penalty {
            return Ok(None);
        }
        if request.action != ReviewAction::Action {
            return Err(EngineError::Validation(
                "a penalty can only be issued with action='action'".to_string(),
            ));
        }
        let kind = request.penalty_type.ok_or_else(|| {
            EngineError::Validation("issue_penalty requires penalty_type".to_string())
        })?;
        Ok(Some(PenaltyDraft {
            user_id: author_id,
            kind,
            reason: request
                .penalty_reason
                .clone()
                .unwrap_or_else(|| kind.as_str().to_string()),
            issued_by: reviewer_id,
            // The delta routes through the ledger's table; the store applies
            // it inside the review transaction to keep the whole decision
            // atomic.
            trust_delta: self.ledger.penalty_delta(kind),
        }))
    }
}
