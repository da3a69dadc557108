//! Operator-facing reel lifecycle: registration, review, and status queries.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use reelbot_core::{
    next_posting_time, Clock, DuePost, FailureDisposition, NewReel, PostingSlot, PublishResult,
    PublishedPost, QueueStatus, Reel, ReelEvent, ReelStatus, ScheduledPost, Store, StoreError,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("cannot {event} reel {reel_id}: it is {actual}")]
    InvalidState {
        reel_id: i64,
        actual: ReelStatus,
        event: ReelEvent,
    },
    #[error("reel {0} not found")]
    NotFound(i64),
    #[error("invalid reel: {0}")]
    Validation(String),
    #[error(transparent)]
    Store(StoreError),
}

impl LifecycleError {
    fn from_store(err: StoreError, reel_id: i64, event: ReelEvent) -> Self {
        match err {
            StoreError::NotFound => LifecycleError::NotFound(reel_id),
            StoreError::ReelStatusConflict { actual } => LifecycleError::InvalidState {
                reel_id,
                actual,
                event,
            },
            other => LifecycleError::Store(other),
        }
    }
}

#[derive(Clone)]
pub struct LifecycleManager {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    slots: Vec<PostingSlot>,
}

impl LifecycleManager {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, slots: Vec<PostingSlot>) -> Self {
        Self {
            store,
            clock,
            slots,
        }
    }

    /// Registers a rendered reel awaiting review.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Validation`] for a blank output locator or
    /// caption, or [`LifecycleError::Store`] if the insert fails.
    pub async fn create(&self, reel: &NewReel) -> Result<Reel, LifecycleError> {
        if reel.output_locator.trim().is_empty() {
            return Err(LifecycleError::Validation(
                "output locator must not be empty".to_string(),
            ));
        }
        if reel.caption.trim().is_empty() {
            return Err(LifecycleError::Validation(
                "caption must not be empty".to_string(),
            ));
        }
        if reel.theme.trim().is_empty() {
            return Err(LifecycleError::Validation(
                "theme must not be empty".to_string(),
            ));
        }

        let created = self
            .store
            .insert_reel(reel, self.clock.now())
            .await
            .map_err(LifecycleError::Store)?;
        tracing::info!(reel_id = created.id, theme = %created.theme, "reel registered");
        Ok(created)
    }

    /// Approves a pending reel and schedules it.
    ///
    /// Without an explicit `scheduled_time` the next configured posting slot
    /// is used.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidState`] when the reel is not pending
    /// (including a lost race with a concurrent review),
    /// [`LifecycleError::NotFound`] for an unknown reel,
    /// [`LifecycleError::Validation`] when no time is given and no posting
    /// slot is configured, or [`LifecycleError::Store`] on storage failure.
    pub async fn approve(
        &self,
        reel_id: i64,
        scheduled_time: Option<DateTime<Utc>>,
    ) -> Result<ScheduledPost, LifecycleError> {
        let now = self.clock.now();
        let scheduled_time = match scheduled_time {
            Some(at) => at,
            None => next_posting_time(now, &self.slots).ok_or_else(|| {
                LifecycleError::Validation(
                    "no scheduled time given and no posting slots configured".to_string(),
                )
            })?,
        };

        let post = self
            .store
            .approve_reel(reel_id, now, scheduled_time)
            .await
            .map_err(|e| LifecycleError::from_store(e, reel_id, ReelEvent::Approve))?;
        tracing::info!(
            reel_id,
            post_id = post.id,
            scheduled_time = %post.scheduled_time,
            "reel approved and scheduled"
        );
        Ok(post)
    }

    /// Rejects a pending reel, rolling back the usage it recorded.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidState`] when the reel is not pending,
    /// [`LifecycleError::NotFound`] for an unknown reel, or
    /// [`LifecycleError::Store`] on storage failure.
    pub async fn reject(&self, reel_id: i64) -> Result<Reel, LifecycleError> {
        let reel = self
            .store
            .reject_reel(reel_id)
            .await
            .map_err(|e| LifecycleError::from_store(e, reel_id, ReelEvent::Reject))?;
        tracing::info!(reel_id, "reel rejected");
        Ok(reel)
    }

    /// Records a successful publish: scheduled -> published for the reel,
    /// together with the published post and the scheduled post's status.
    ///
    /// Only the publication scheduler calls this, holding the claim it
    /// attempted. The reel and its post change status together.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::LeaseLost`] or a status conflict when the claim
    /// is stale, or [`StoreError::Backend`] on storage failure.
    pub(crate) async fn mark_published(
        &self,
        claim: &DuePost,
        result: &PublishResult,
        published_at: DateTime<Utc>,
    ) -> Result<PublishedPost, StoreError> {
        self.store
            .complete_publication(claim, result, published_at)
            .await
    }

    /// Records a failed attempt. An exhausted retry budget moves the reel
    /// scheduled -> failed along with its post; otherwise the post is pushed
    /// to its next attempt and the reel stays scheduled.
    ///
    /// # Errors
    ///
    /// As [`Self::mark_published`].
    pub(crate) async fn mark_failed(
        &self,
        claim: &DuePost,
        error_message: &str,
        disposition: FailureDisposition,
    ) -> Result<ScheduledPost, StoreError> {
        self.store
            .record_failed_attempt(claim, error_message, disposition)
            .await
    }

    /// # Errors
    ///
    /// Returns [`LifecycleError::NotFound`] for an unknown reel.
    pub async fn get(&self, reel_id: i64) -> Result<Reel, LifecycleError> {
        self.store.get_reel(reel_id).await.map_err(|e| match e {
            StoreError::NotFound => LifecycleError::NotFound(reel_id),
            other => LifecycleError::Store(other),
        })
    }

    /// # Errors
    ///
    /// Returns [`LifecycleError::Store`] on storage failure.
    pub async fn list(
        &self,
        status: Option<ReelStatus>,
        limit: i64,
    ) -> Result<Vec<Reel>, LifecycleError> {
        self.store
            .list_reels(status, limit)
            .await
            .map_err(LifecycleError::Store)
    }

    /// # Errors
    ///
    /// Returns [`LifecycleError::Store`] on storage failure.
    pub async fn queue_status(&self) -> Result<QueueStatus, LifecycleError> {
        self.store
            .queue_status()
            .await
            .map_err(LifecycleError::Store)
    }
}

#[cfg(test)]
#[path = "lifecycle_test.rs"]
mod tests;
