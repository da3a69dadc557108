//! Domain records shared by the store, the engine, and the operator surfaces.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lifecycle::ReelStatus;
use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Video,
    Audio,
    Quote,
}

impl AssetKind {
    pub const ALL: [AssetKind; 3] = [AssetKind::Video, AssetKind::Audio, AssetKind::Quote];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AssetKind::Video => "video",
            AssetKind::Audio => "audio",
            AssetKind::Quote => "quote",
        }
    }
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(AssetKind::Video),
            "audio" => Ok(AssetKind::Audio),
            "quote" => Ok(AssetKind::Quote),
            other => Err(CoreError::UnknownAssetKind(other.to_string())),
        }
    }
}

/// A catalogued video clip, audio track, or quote.
///
/// For quotes `locator` holds the quote text itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: i64,
    pub kind: AssetKind,
    pub locator: String,
    pub author: Option<String>,
    pub tags: Vec<String>,
    pub duration_secs: Option<f64>,
    pub quality_score: Option<f64>,
    pub usage_count: i32,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Asset {
    /// Returns `true` if any of the asset's tags appears in `tags`.
    #[must_use]
    pub fn matches_any_tag(&self, tags: &[String]) -> bool {
        self.tags.iter().any(|t| tags.contains(t))
    }
}

/// Input for cataloguing a new asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAsset {
    pub kind: AssetKind,
    pub locator: String,
    pub author: Option<String>,
    pub tags: Vec<String>,
    pub duration_secs: Option<f64>,
    pub quality_score: Option<f64>,
}

/// One video, one audio track, and one quote drawn for a theme.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThemedCombination {
    pub theme: String,
    pub video: Asset,
    pub audio: Asset,
    pub quote: Asset,
}

impl ThemedCombination {
    #[must_use]
    pub fn asset_ids(&self) -> [i64; 3] {
        [self.video.id, self.audio.id, self.quote.id]
    }
}

/// What an external renderer reports after producing an artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderResult {
    pub output_locator: String,
    pub caption: String,
    #[serde(default)]
    pub duration_secs: Option<f64>,
    #[serde(default)]
    pub quality_score: Option<f64>,
    #[serde(default)]
    pub render_time_secs: Option<f64>,
    #[serde(default)]
    pub file_size_bytes: Option<i64>,
}

/// Render metadata bag persisted alongside a reel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_time_secs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size_bytes: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReel {
    pub video_id: i64,
    pub audio_id: i64,
    pub quote_id: i64,
    pub theme: String,
    pub output_locator: String,
    pub caption: String,
    pub render: RenderMetadata,
}

impl NewReel {
    /// Builds the reel registration for a rendered combination.
    #[must_use]
    pub fn from_render(combo: &ThemedCombination, result: RenderResult) -> Self {
        Self {
            video_id: combo.video.id,
            audio_id: combo.audio.id,
            quote_id: combo.quote.id,
            theme: combo.theme.clone(),
            output_locator: result.output_locator,
            caption: result.caption,
            render: RenderMetadata {
                duration_secs: result.duration_secs,
                quality_score: result.quality_score,
                render_time_secs: result.render_time_secs,
                file_size_bytes: result.file_size_bytes,
            },
        }
    }

    #[must_use]
    pub fn asset_ids(&self) -> [i64; 3] {
        [self.video_id, self.audio_id, self.quote_id]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reel {
    pub id: i64,
    pub video_id: i64,
    pub audio_id: i64,
    pub quote_id: i64,
    pub theme: String,
    pub output_locator: String,
    pub caption: String,
    pub status: ReelStatus,
    pub render: RenderMetadata,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
}

impl Reel {
    #[must_use]
    pub fn asset_ids(&self) -> [i64; 3] {
        [self.video_id, self.audio_id, self.quote_id]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Pending,
    Published,
    Failed,
}

impl PostStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Pending => "pending",
            PostStatus::Published => "published",
            PostStatus::Failed => "failed",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, PostStatus::Pending)
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PostStatus::Pending),
            "published" => Ok(PostStatus::Published),
            "failed" => Ok(PostStatus::Failed),
            other => Err(CoreError::UnknownPostStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledPost {
    pub id: i64,
    pub reel_id: i64,
    pub scheduled_time: DateTime<Utc>,
    pub status: PostStatus,
    pub retry_count: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

/// A scheduled post claimed by one publication cycle.
///
/// Outcome writes must present `claim_token`; a stale token means another
/// attempt took over and the write is refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuePost {
    pub post: ScheduledPost,
    pub claim_token: Uuid,
    pub output_locator: String,
    pub caption: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResult {
    pub external_media_id: String,
    #[serde(default)]
    pub permalink: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedPost {
    pub id: i64,
    pub scheduled_post_id: i64,
    pub reel_id: i64,
    pub external_media_id: String,
    pub permalink: Option<String>,
    pub caption: String,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementCounts {
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    pub reach: i64,
    pub saves: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPostMetrics {
    pub published_post_id: i64,
    pub counts: EngagementCounts,
    pub collected_at: DateTime<Utc>,
    pub bucket_start: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostMetrics {
    pub id: i64,
    pub published_post_id: i64,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    pub reach: i64,
    pub saves: i64,
    pub engagement_rate: f64,
    pub collected_at: DateTime<Utc>,
    pub bucket_start: DateTime<Utc>,
}

/// Reel counts per lifecycle status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
    pub scheduled: i64,
    pub published: i64,
    pub failed: i64,
}

impl QueueStatus {
    /// Reels still heading for publication.
    #[must_use]
    pub fn backlog(&self) -> i64 {
        self.pending + self.approved + self.scheduled
    }

    pub fn add(&mut self, status: ReelStatus, count: i64) {
        let slot = match status {
            ReelStatus::Pending => &mut self.pending,
            ReelStatus::Approved => &mut self.approved,
            ReelStatus::Rejected => &mut self.rejected,
            ReelStatus::Scheduled => &mut self.scheduled,
            ReelStatus::Published => &mut self.published,
            ReelStatus::Failed => &mut self.failed,
        };
        *slot += count;
    }
}
