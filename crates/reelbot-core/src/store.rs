//! Persistence boundary consumed by the engine.
//!
//! Every status-changing method is an atomic compare-and-set against the
//! expected prior state; usage counters change through atomic increments
//! and decrements only.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{
    Asset, AssetKind, DuePost, NewPostMetrics, NewReel, PostMetrics, PostStatus, PublishResult,
    PublishedPost, QueueStatus, Reel, ScheduledPost,
};
use crate::lifecycle::ReelStatus;
use crate::retry::FailureDisposition;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    /// A reel compare-and-set lost: the reel was not in the expected status.
    #[error("reel is {actual}")]
    ReelStatusConflict { actual: ReelStatus },
    /// A scheduled-post compare-and-set lost.
    #[error("scheduled post is {actual}")]
    PostStatusConflict { actual: PostStatus },
    /// The attempt lease on a scheduled post was taken over or released.
    #[error("attempt lease on scheduled post {post_id} is no longer held")]
    LeaseLost { post_id: i64 },
    #[error("storage error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StoreError::Backend(Box::new(err))
    }
}

#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Assets of `kind` whose tags intersect `tags`.
    async fn list_candidates(
        &self,
        kind: AssetKind,
        tags: &[String],
    ) -> Result<Vec<Asset>, StoreError>;

    /// Atomically increments `usage_count` and stamps `last_used_at`.
    async fn record_usage(&self, asset_id: i64, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Undoes one [`AssetStore::record_usage`] for a combination that never
    /// became a reel. Floors at zero.
    async fn release_usage(&self, asset_id: i64) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ReelStore: Send + Sync {
    async fn insert_reel(&self, reel: &NewReel, created_at: DateTime<Utc>)
        -> Result<Reel, StoreError>;

    async fn get_reel(&self, reel_id: i64) -> Result<Reel, StoreError>;

    async fn list_reels(
        &self,
        status: Option<ReelStatus>,
        limit: i64,
    ) -> Result<Vec<Reel>, StoreError>;

    async fn queue_status(&self) -> Result<QueueStatus, StoreError>;

    /// In one transaction: pending -> approved, insert the scheduled post,
    /// approved -> scheduled.
    ///
    /// Fails with [`StoreError::ReelStatusConflict`] when the reel is not
    /// pending.
    async fn approve_reel(
        &self,
        reel_id: i64,
        approved_at: DateTime<Utc>,
        scheduled_time: DateTime<Utc>,
    ) -> Result<ScheduledPost, StoreError>;

    /// In one transaction: pending -> rejected and roll back the usage of
    /// the three referenced assets.
    async fn reject_reel(&self, reel_id: i64) -> Result<Reel, StoreError>;
}

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn get_scheduled_post(&self, post_id: i64) -> Result<ScheduledPost, StoreError>;

    async fn scheduled_post_for_reel(&self, reel_id: i64) -> Result<ScheduledPost, StoreError>;

    async fn list_scheduled_posts(
        &self,
        status: Option<PostStatus>,
        limit: i64,
    ) -> Result<Vec<ScheduledPost>, StoreError>;

    /// Leases up to `limit` due pending posts, oldest `scheduled_time` first.
    ///
    /// Posts whose lease is still live are skipped, so a post is attempted
    /// by at most one cycle at a time.
    async fn claim_due_posts(
        &self,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<DuePost>, StoreError>;

    /// In one transaction: insert the published post, mark the scheduled
    /// post published, move the reel scheduled -> published, drop the lease.
    async fn complete_publication(
        &self,
        claim: &DuePost,
        result: &PublishResult,
        published_at: DateTime<Utc>,
    ) -> Result<PublishedPost, StoreError>;

    /// Persist a failed attempt. For [`FailureDisposition::Exhausted`] the
    /// post becomes failed and the reel moves scheduled -> failed in the same
    /// transaction.
    async fn record_failed_attempt(
        &self,
        claim: &DuePost,
        error_message: &str,
        disposition: FailureDisposition,
    ) -> Result<ScheduledPost, StoreError>;

    /// Move a pending post's `scheduled_time`; refuses terminal posts.
    async fn reschedule_post(
        &self,
        post_id: i64,
        scheduled_time: DateTime<Utc>,
    ) -> Result<ScheduledPost, StoreError>;
}

#[async_trait]
pub trait MetricsStore: Send + Sync {
    /// Published posts at least as old as `published_before` with no
    /// snapshot in `bucket_start`.
    async fn posts_due_for_metrics(
        &self,
        published_before: DateTime<Utc>,
        bucket_start: DateTime<Utc>,
    ) -> Result<Vec<PublishedPost>, StoreError>;

    /// Appends a snapshot; `None` when the bucket already has one.
    async fn insert_post_metrics(
        &self,
        metrics: &NewPostMetrics,
    ) -> Result<Option<PostMetrics>, StoreError>;

    async fn list_post_metrics(
        &self,
        published_post_id: i64,
    ) -> Result<Vec<PostMetrics>, StoreError>;
}

/// Everything the engine needs from persistence.
pub trait Store: AssetStore + ReelStore + PostStore + MetricsStore {}

impl<T> Store for T where T: AssetStore + ReelStore + PostStore + MetricsStore {}
