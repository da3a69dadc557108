//! Append-only engagement snapshots in `post_metrics`.

use chrono::{DateTime, Utc};
use reelbot_core::{engagement_rate, NewPostMetrics, PostMetrics};
use sqlx::PgPool;

use crate::DbError;

const METRICS_COLUMNS: &str = "id, published_post_id, likes, comments, shares, reach, saves, \
                               engagement_rate, collected_at, bucket_start";

/// A row from the `post_metrics` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostMetricsRow {
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

impl From<PostMetricsRow> for PostMetrics {
    fn from(row: PostMetricsRow) -> Self {
        PostMetrics {
            id: row.id,
            published_post_id: row.published_post_id,
            likes: row.likes,
            comments: row.comments,
            shares: row.shares,
            reach: row.reach,
            saves: row.saves,
            engagement_rate: row.engagement_rate,
            collected_at: row.collected_at,
            bucket_start: row.bucket_start,
        }
    }
}

/// Appends a snapshot. Returns `None` when the `(post, bucket)` pair is
/// already recorded, so a repeated collection run writes nothing.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_post_metrics(
    pool: &PgPool,
    metrics: &NewPostMetrics,
) -> Result<Option<PostMetricsRow>, DbError> {
    let sql = format!(
        "INSERT INTO post_metrics \
             (published_post_id, likes, comments, shares, reach, saves, engagement_rate, \
              collected_at, bucket_start) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         ON CONFLICT (published_post_id, bucket_start) DO NOTHING \
         RETURNING {METRICS_COLUMNS}"
    );
    let counts = metrics.counts;
    let row = sqlx::query_as::<_, PostMetricsRow>(&sql)
        .bind(metrics.published_post_id)
        .bind(counts.likes)
        .bind(counts.comments)
        .bind(counts.shares)
        .bind(counts.reach)
        .bind(counts.saves)
        .bind(engagement_rate(&counts))
        .bind(metrics.collected_at)
        .bind(metrics.bucket_start)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// All snapshots for one publication, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_post_metrics(
    pool: &PgPool,
    published_post_id: i64,
) -> Result<Vec<PostMetricsRow>, DbError> {
    let sql = format!(
        "SELECT {METRICS_COLUMNS} FROM post_metrics \
         WHERE published_post_id = $1 \
         ORDER BY collected_at ASC, id ASC"
    );
    let rows = sqlx::query_as::<_, PostMetricsRow>(&sql)
        .bind(published_post_id)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}
