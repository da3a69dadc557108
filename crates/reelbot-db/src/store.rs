//! Postgres implementation of the engine's persistence traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reelbot_core::{
    Asset, AssetKind, AssetStore, DuePost, FailureDisposition, MetricsStore, NewPostMetrics,
    NewReel, PostMetrics, PostStatus, PostStore, PublishResult, PublishedPost, QueueStatus, Reel,
    ReelStatus, ReelStore, ScheduledPost, StoreError,
};
use sqlx::PgPool;

use crate::DbError;

/// Thin adapter from the store traits onto the per-table query functions.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound => StoreError::NotFound,
            DbError::ReelStatusConflict { actual, .. } => StoreError::ReelStatusConflict { actual },
            DbError::PostStatusConflict { actual, .. } => StoreError::PostStatusConflict { actual },
            DbError::LeaseLost { post_id } => StoreError::LeaseLost { post_id },
            other => StoreError::backend(other),
        }
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, StoreError>
where
    T: TryFrom<R, Error = DbError>,
{
    rows.into_iter()
        .map(|row| T::try_from(row).map_err(StoreError::from))
        .collect()
}

#[async_trait]
impl AssetStore for PgStore {
    async fn list_candidates(
        &self,
        kind: AssetKind,
        tags: &[String],
    ) -> Result<Vec<Asset>, StoreError> {
        convert_all(crate::assets::list_candidates(&self.pool, kind, tags).await?)
    }

    async fn record_usage(&self, asset_id: i64, at: DateTime<Utc>) -> Result<(), StoreError> {
        Ok(crate::assets::record_usage(&self.pool, asset_id, at).await?)
    }

    async fn release_usage(&self, asset_id: i64) -> Result<(), StoreError> {
        Ok(crate::assets::release_usage(&self.pool, asset_id).await?)
    }
}

#[async_trait]
impl ReelStore for PgStore {
    async fn insert_reel(
        &self,
        reel: &NewReel,
        created_at: DateTime<Utc>,
    ) -> Result<Reel, StoreError> {
        let row = crate::reels::insert_reel(&self.pool, reel, created_at).await?;
        Ok(Reel::try_from(row)?)
    }

    async fn get_reel(&self, reel_id: i64) -> Result<Reel, StoreError> {
        let row = crate::reels::get_reel(&self.pool, reel_id).await?;
        Ok(Reel::try_from(row)?)
    }

    async fn list_reels(
        &self,
        status: Option<ReelStatus>,
        limit: i64,
    ) -> Result<Vec<Reel>, StoreError> {
        convert_all(crate::reels::list_reels(&self.pool, status, limit).await?)
    }

    async fn queue_status(&self) -> Result<QueueStatus, StoreError> {
        Ok(crate::reels::queue_status(&self.pool).await?)
    }

    async fn approve_reel(
        &self,
        reel_id: i64,
        approved_at: DateTime<Utc>,
        scheduled_time: DateTime<Utc>,
    ) -> Result<ScheduledPost, StoreError> {
        let row =
            crate::reels::approve_reel(&self.pool, reel_id, approved_at, scheduled_time).await?;
        Ok(ScheduledPost::try_from(row)?)
    }

    async fn reject_reel(&self, reel_id: i64) -> Result<Reel, StoreError> {
        let row = crate::reels::reject_reel(&self.pool, reel_id).await?;
        Ok(Reel::try_from(row)?)
    }
}

#[async_trait]
impl PostStore for PgStore {
    async fn get_scheduled_post(&self, post_id: i64) -> Result<ScheduledPost, StoreError> {
        let row = crate::scheduled_posts::get_scheduled_post(&self.pool, post_id).await?;
        Ok(ScheduledPost::try_from(row)?)
    }

    async fn scheduled_post_for_reel(&self, reel_id: i64) -> Result<ScheduledPost, StoreError> {
        let row = crate::scheduled_posts::scheduled_post_for_reel(&self.pool, reel_id).await?;
        Ok(ScheduledPost::try_from(row)?)
    }

    async fn list_scheduled_posts(
        &self,
        status: Option<PostStatus>,
        limit: i64,
    ) -> Result<Vec<ScheduledPost>, StoreError> {
        convert_all(crate::scheduled_posts::list_scheduled_posts(&self.pool, status, limit).await?)
    }

    async fn claim_due_posts(
        &self,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<DuePost>, StoreError> {
        convert_all(
            crate::scheduled_posts::claim_due_posts(&self.pool, now, lease_until, limit).await?,
        )
    }

    async fn complete_publication(
        &self,
        claim: &DuePost,
        result: &PublishResult,
        published_at: DateTime<Utc>,
    ) -> Result<PublishedPost, StoreError> {
        let row =
            crate::scheduled_posts::complete_publication(&self.pool, claim, result, published_at)
                .await?;
        Ok(row.into())
    }

    async fn record_failed_attempt(
        &self,
        claim: &DuePost,
        error_message: &str,
        disposition: FailureDisposition,
    ) -> Result<ScheduledPost, StoreError> {
        let row = crate::scheduled_posts::record_failed_attempt(
            &self.pool,
            claim,
            error_message,
            disposition,
        )
        .await?;
        Ok(ScheduledPost::try_from(row)?)
    }

    async fn reschedule_post(
        &self,
        post_id: i64,
        scheduled_time: DateTime<Utc>,
    ) -> Result<ScheduledPost, StoreError> {
        let row =
            crate::scheduled_posts::reschedule_post(&self.pool, post_id, scheduled_time).await?;
        Ok(ScheduledPost::try_from(row)?)
    }
}

#[async_trait]
impl MetricsStore for PgStore {
    async fn posts_due_for_metrics(
        &self,
        published_before: DateTime<Utc>,
        bucket_start: DateTime<Utc>,
    ) -> Result<Vec<PublishedPost>, StoreError> {
        let rows = crate::published_posts::posts_due_for_metrics(
            &self.pool,
            published_before,
            bucket_start,
        )
        .await?;
        Ok(rows.into_iter().map(PublishedPost::from).collect())
    }

    async fn insert_post_metrics(
        &self,
        metrics: &NewPostMetrics,
    ) -> Result<Option<PostMetrics>, StoreError> {
        let row = crate::post_metrics::insert_post_metrics(&self.pool, metrics).await?;
        Ok(row.map(PostMetrics::from))
    }

    async fn list_post_metrics(
        &self,
        published_post_id: i64,
    ) -> Result<Vec<PostMetrics>, StoreError> {
        let rows = crate::post_metrics::list_post_metrics(&self.pool, published_post_id).await?;
        Ok(rows.into_iter().map(PostMetrics::from).collect())
    }
}
