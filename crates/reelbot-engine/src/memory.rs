//! In-process [`Store`](reelbot_core::Store) used by tests and dry runs.
//!
//! Mirrors the Postgres store's guarantees: every status change is a
//! compare-and-set under one lock, outcome writes require the live claim
//! token, and usage rollback recomputes `last_used_at` from the reels that
//! still hold usage.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reelbot_core::{
    engagement_rate, Asset, AssetKind, AssetStore, DuePost, FailureDisposition, MetricsStore,
    NewAsset, NewPostMetrics, NewReel, PostMetrics, PostStatus, PostStore, PublishResult,
    PublishedPost, QueueStatus, Reel, ReelEvent, ReelStatus, ReelStore, ScheduledPost,
    StoreError,
};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct PostRecord {
    post: ScheduledPost,
    claim: Option<(Uuid, DateTime<Utc>)>,
}

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    assets: BTreeMap<i64, Asset>,
    reels: BTreeMap<i64, Reel>,
    posts: BTreeMap<i64, PostRecord>,
    published: BTreeMap<i64, PublishedPost>,
    metrics: Vec<PostMetrics>,
}

impl State {
    fn id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn reel_mut(&mut self, id: i64) -> Result<&mut Reel, StoreError> {
        self.reels.get_mut(&id).ok_or(StoreError::NotFound)
    }

    fn apply_reel_event(&mut self, id: i64, event: ReelEvent) -> Result<(), StoreError> {
        let reel = self.reel_mut(id)?;
        reel.status = reel
            .status
            .apply(event)
            .map_err(|e| StoreError::ReelStatusConflict { actual: e.from })?;
        Ok(())
    }

    fn claimed_post(&mut self, claim: &DuePost) -> Result<&mut PostRecord, StoreError> {
        let record = self
            .posts
            .get_mut(&claim.post.id)
            .ok_or(StoreError::NotFound)?;
        if record.post.status != PostStatus::Pending {
            return Err(StoreError::PostStatusConflict {
                actual: record.post.status,
            });
        }
        let held = matches!(record.claim, Some((token, _)) if token == claim.claim_token);
        if !held {
            return Err(StoreError::LeaseLost {
                post_id: claim.post.id,
            });
        }
        Ok(record)
    }

    fn roll_back_usage(&mut self, asset_id: i64) -> Result<(), StoreError> {
        let latest = self
            .reels
            .values()
            .filter(|r| r.status.holds_usage() && r.asset_ids().contains(&asset_id))
            .map(|r| r.created_at)
            .max();
        let asset = self.assets.get_mut(&asset_id).ok_or(StoreError::NotFound)?;
        asset.last_used_at = if asset.usage_count <= 1 {
            None
        } else {
            latest.or(asset.last_used_at)
        };
        asset.usage_count = (asset.usage_count - 1).max(0);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Catalogues an asset with zero usage.
    pub fn add_asset(&self, asset: NewAsset, created_at: DateTime<Utc>) -> Asset {
        let mut state = self.lock();
        let id = state.id();
        let asset = Asset {
            id,
            kind: asset.kind,
            locator: asset.locator,
            author: asset.author,
            tags: asset.tags,
            duration_secs: asset.duration_secs,
            quality_score: asset.quality_score,
            usage_count: 0,
            last_used_at: None,
            created_at,
        };
        state.assets.insert(id, asset.clone());
        asset
    }

    /// Overwrites an asset's usage tracking, for setting up scenarios.
    pub fn set_usage(&self, asset_id: i64, usage_count: i32, last_used_at: Option<DateTime<Utc>>) {
        if let Some(asset) = self.lock().assets.get_mut(&asset_id) {
            asset.usage_count = usage_count;
            asset.last_used_at = last_used_at;
        }
    }

    #[must_use]
    pub fn asset(&self, asset_id: i64) -> Option<Asset> {
        self.lock().assets.get(&asset_id).cloned()
    }

    #[must_use]
    pub fn published_posts(&self) -> Vec<PublishedPost> {
        self.lock().published.values().cloned().collect()
    }
}

#[async_trait]
impl AssetStore for MemoryStore {
    async fn list_candidates(
        &self,
        kind: AssetKind,
        tags: &[String],
    ) -> Result<Vec<Asset>, StoreError> {
        Ok(self
            .lock()
            .assets
            .values()
            .filter(|a| a.kind == kind && a.matches_any_tag(tags))
            .cloned()
            .collect())
    }

    async fn record_usage(&self, asset_id: i64, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut state = self.lock();
        let asset = state.assets.get_mut(&asset_id).ok_or(StoreError::NotFound)?;
        asset.usage_count += 1;
        asset.last_used_at = Some(at);
        Ok(())
    }

    async fn release_usage(&self, asset_id: i64) -> Result<(), StoreError> {
        self.lock().roll_back_usage(asset_id)
    }
}

#[async_trait]
impl ReelStore for MemoryStore {
    async fn insert_reel(
        &self,
        reel: &NewReel,
        created_at: DateTime<Utc>,
    ) -> Result<Reel, StoreError> {
        let mut state = self.lock();
        if reel
            .asset_ids()
            .iter()
            .any(|id| !state.assets.contains_key(id))
        {
            return Err(StoreError::NotFound);
        }
        let id = state.id();
        let reel = Reel {
            id,
            video_id: reel.video_id,
            audio_id: reel.audio_id,
            quote_id: reel.quote_id,
            theme: reel.theme.clone(),
            output_locator: reel.output_locator.clone(),
            caption: reel.caption.clone(),
            status: ReelStatus::Pending,
            render: reel.render.clone(),
            created_at,
            approved_at: None,
        };
        state.reels.insert(id, reel.clone());
        Ok(reel)
    }

    async fn get_reel(&self, reel_id: i64) -> Result<Reel, StoreError> {
        self.lock()
            .reels
            .get(&reel_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list_reels(
        &self,
        status: Option<ReelStatus>,
        limit: i64,
    ) -> Result<Vec<Reel>, StoreError> {
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self
            .lock()
            .reels
            .values()
            .rev()
            .filter(|r| status.is_none_or(|s| r.status == s))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn queue_status(&self) -> Result<QueueStatus, StoreError> {
        let mut status = QueueStatus::default();
        for reel in self.lock().reels.values() {
            status.add(reel.status, 1);
        }
        Ok(status)
    }

    async fn approve_reel(
        &self,
        reel_id: i64,
        approved_at: DateTime<Utc>,
        scheduled_time: DateTime<Utc>,
    ) -> Result<ScheduledPost, StoreError> {
        let mut state = self.lock();
        let current = state.reel_mut(reel_id)?.status;
        let approved = current
            .apply(ReelEvent::Approve)
            .map_err(|e| StoreError::ReelStatusConflict { actual: e.from })?;
        let scheduled = approved
            .apply(ReelEvent::Schedule)
            .map_err(|e| StoreError::ReelStatusConflict { actual: e.from })?;

        let id = state.id();
        let post = ScheduledPost {
            id,
            reel_id,
            scheduled_time,
            status: PostStatus::Pending,
            retry_count: 0,
            error_message: None,
            created_at: approved_at,
            published_at: None,
        };
        state.posts.insert(
            id,
            PostRecord {
                post: post.clone(),
                claim: None,
            },
        );
        let reel = state.reel_mut(reel_id)?;
        reel.status = scheduled;
        reel.approved_at = Some(approved_at);
        Ok(post)
    }

    async fn reject_reel(&self, reel_id: i64) -> Result<Reel, StoreError> {
        let mut state = self.lock();
        state.apply_reel_event(reel_id, ReelEvent::Reject)?;
        let reel = state.reel_mut(reel_id)?.clone();
        for asset_id in reel.asset_ids() {
            state.roll_back_usage(asset_id)?;
        }
        Ok(reel)
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn get_scheduled_post(&self, post_id: i64) -> Result<ScheduledPost, StoreError> {
        self.lock()
            .posts
            .get(&post_id)
            .map(|r| r.post.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn scheduled_post_for_reel(&self, reel_id: i64) -> Result<ScheduledPost, StoreError> {
        self.lock()
            .posts
            .values()
            .find(|r| r.post.reel_id == reel_id)
            .map(|r| r.post.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn list_scheduled_posts(
        &self,
        status: Option<PostStatus>,
        limit: i64,
    ) -> Result<Vec<ScheduledPost>, StoreError> {
        let limit = usize::try_from(limit).unwrap_or(0);
        let mut posts: Vec<ScheduledPost> = self
            .lock()
            .posts
            .values()
            .filter(|r| status.is_none_or(|s| r.post.status == s))
            .map(|r| r.post.clone())
            .collect();
        posts.sort_by_key(|p| (p.scheduled_time, p.id));
        posts.truncate(limit);
        Ok(posts)
    }

    async fn claim_due_posts(
        &self,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<DuePost>, StoreError> {
        let limit = usize::try_from(limit).unwrap_or(0);
        let mut state = self.lock();

        let mut due: Vec<(DateTime<Utc>, i64)> = state
            .posts
            .values()
            .filter(|r| {
                r.post.status == PostStatus::Pending
                    && r.post.scheduled_time <= now
                    && r.claim.is_none_or(|(_, until)| until <= now)
            })
            .map(|r| (r.post.scheduled_time, r.post.id))
            .collect();
        due.sort_unstable();
        due.truncate(limit);

        let claim_token = Uuid::new_v4();
        let mut claimed = Vec::with_capacity(due.len());
        for (_, post_id) in due {
            let Some(record) = state.posts.get_mut(&post_id) else {
                continue;
            };
            record.claim = Some((claim_token, lease_until));
            let post = record.post.clone();
            let reel = state.reels.get(&post.reel_id).ok_or(StoreError::NotFound)?;
            claimed.push(DuePost {
                output_locator: reel.output_locator.clone(),
                caption: reel.caption.clone(),
                post,
                claim_token,
            });
        }
        Ok(claimed)
    }

    async fn complete_publication(
        &self,
        claim: &DuePost,
        result: &PublishResult,
        published_at: DateTime<Utc>,
    ) -> Result<PublishedPost, StoreError> {
        let mut state = self.lock();
        state.claimed_post(claim)?;

        let reel_status = state.reel_mut(claim.post.reel_id)?.status;
        let published_status = reel_status
            .apply(ReelEvent::Publish)
            .map_err(|e| StoreError::ReelStatusConflict { actual: e.from })?;

        let record = state.claimed_post(claim)?;
        record.post.status = PostStatus::Published;
        record.post.published_at = Some(published_at);
        record.post.error_message = None;
        record.claim = None;

        state.reel_mut(claim.post.reel_id)?.status = published_status;

        let id = state.id();
        let published = PublishedPost {
            id,
            scheduled_post_id: claim.post.id,
            reel_id: claim.post.reel_id,
            external_media_id: result.external_media_id.clone(),
            permalink: result.permalink.clone(),
            caption: claim.caption.clone(),
            published_at,
        };
        state.published.insert(id, published.clone());
        Ok(published)
    }

    async fn record_failed_attempt(
        &self,
        claim: &DuePost,
        error_message: &str,
        disposition: FailureDisposition,
    ) -> Result<ScheduledPost, StoreError> {
        let mut state = self.lock();
        state.claimed_post(claim)?;

        if matches!(disposition, FailureDisposition::Exhausted { .. }) {
            state.apply_reel_event(claim.post.reel_id, ReelEvent::Fail)?;
        }

        let record = state.claimed_post(claim)?;
        record.post.retry_count = disposition.retry_count();
        record.post.error_message = Some(error_message.to_string());
        record.claim = None;
        match disposition {
            FailureDisposition::Retry {
                next_attempt_at, ..
            } => record.post.scheduled_time = next_attempt_at,
            FailureDisposition::Exhausted { .. } => record.post.status = PostStatus::Failed,
        }
        Ok(record.post.clone())
    }

    async fn reschedule_post(
        &self,
        post_id: i64,
        scheduled_time: DateTime<Utc>,
    ) -> Result<ScheduledPost, StoreError> {
        let mut state = self.lock();
        let record = state.posts.get_mut(&post_id).ok_or(StoreError::NotFound)?;
        if record.post.status != PostStatus::Pending {
            return Err(StoreError::PostStatusConflict {
                actual: record.post.status,
            });
        }
        record.post.scheduled_time = scheduled_time;
        Ok(record.post.clone())
    }
}

#[async_trait]
impl MetricsStore for MemoryStore {
    async fn posts_due_for_metrics(
        &self,
        published_before: DateTime<Utc>,
        bucket_start: DateTime<Utc>,
    ) -> Result<Vec<PublishedPost>, StoreError> {
        let state = self.lock();
        let mut due: Vec<PublishedPost> = state
            .published
            .values()
            .filter(|p| p.published_at <= published_before)
            .filter(|p| {
                !state
                    .metrics
                    .iter()
                    .any(|m| m.published_post_id == p.id && m.bucket_start == bucket_start)
            })
            .cloned()
            .collect();
        due.sort_by_key(|p| (p.published_at, p.id));
        Ok(due)
    }

    async fn insert_post_metrics(
        &self,
        metrics: &NewPostMetrics,
    ) -> Result<Option<PostMetrics>, StoreError> {
        let mut state = self.lock();
        if !state.published.contains_key(&metrics.published_post_id) {
            return Err(StoreError::NotFound);
        }
        if state.metrics.iter().any(|m| {
            m.published_post_id == metrics.published_post_id
                && m.bucket_start == metrics.bucket_start
        }) {
            return Ok(None);
        }

        let id = state.id();
        let counts = metrics.counts;
        let row = PostMetrics {
            id,
            published_post_id: metrics.published_post_id,
            likes: counts.likes,
            comments: counts.comments,
            shares: counts.shares,
            reach: counts.reach,
            saves: counts.saves,
            engagement_rate: engagement_rate(&counts),
            collected_at: metrics.collected_at,
            bucket_start: metrics.bucket_start,
        };
        state.metrics.push(row.clone());
        Ok(Some(row))
    }

    async fn list_post_metrics(
        &self,
        published_post_id: i64,
    ) -> Result<Vec<PostMetrics>, StoreError> {
        Ok(self
            .lock()
            .metrics
            .iter()
            .filter(|m| m.published_post_id == published_post_id)
            .cloned()
            .collect())
    }
}
