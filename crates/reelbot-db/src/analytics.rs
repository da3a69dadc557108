//! Engagement analytics over the latest snapshot of each publication.
//!
//! Snapshots are cumulative counters, so only the most recent row per post
//! contributes to any aggregate.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::DbError;

const LATEST_SNAPSHOTS: &str = "WITH latest AS ( \
         SELECT DISTINCT ON (m.published_post_id) \
                m.published_post_id, m.likes, m.comments, m.shares, m.reach, m.saves, \
                m.engagement_rate \
         FROM post_metrics m \
         JOIN published_posts p ON p.id = m.published_post_id \
         WHERE p.published_at >= NOW() - make_interval(days => $1) \
         ORDER BY m.published_post_id, m.collected_at DESC, m.id DESC \
     )";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EngagementSummaryRow {
    pub posts: i64,
    pub total_likes: i64,
    pub total_comments: i64,
    pub total_shares: i64,
    pub total_reach: i64,
    pub avg_likes: f64,
    pub avg_comments: f64,
    pub avg_shares: f64,
    pub avg_reach: f64,
    pub avg_engagement_rate: f64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ThemeEngagementRow {
    pub theme: String,
    pub posts: i64,
    pub total_reach: i64,
    pub avg_engagement_rate: f64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TopPostRow {
    pub published_post_id: i64,
    pub reel_id: i64,
    pub theme: String,
    pub external_media_id: String,
    pub permalink: Option<String>,
    pub published_at: DateTime<Utc>,
    pub likes: i64,
    pub reach: i64,
    pub engagement_rate: f64,
}

/// Totals and averages across publications from the last `days` days.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn engagement_summary(pool: &PgPool, days: i32) -> Result<EngagementSummaryRow, DbError> {
    let sql = format!(
        "{LATEST_SNAPSHOTS} \
         SELECT COUNT(*)::BIGINT AS posts, \
                COALESCE(SUM(likes), 0)::BIGINT AS total_likes, \
                COALESCE(SUM(comments), 0)::BIGINT AS total_comments, \
                COALESCE(SUM(shares), 0)::BIGINT AS total_shares, \
                COALESCE(SUM(reach), 0)::BIGINT AS total_reach, \
                COALESCE(AVG(likes), 0)::DOUBLE PRECISION AS avg_likes, \
                COALESCE(AVG(comments), 0)::DOUBLE PRECISION AS avg_comments, \
                COALESCE(AVG(shares), 0)::DOUBLE PRECISION AS avg_shares, \
                COALESCE(AVG(reach), 0)::DOUBLE PRECISION AS avg_reach, \
                COALESCE(AVG(engagement_rate), 0)::DOUBLE PRECISION AS avg_engagement_rate \
         FROM latest"
    );
    let row = sqlx::query_as::<_, EngagementSummaryRow>(&sql)
        .bind(days)
        .fetch_one(pool)
        .await?;

    Ok(row)
}

/// Per-theme engagement across publications from the last `days` days,
/// best average engagement rate first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn engagement_by_theme(
    pool: &PgPool,
    days: i32,
) -> Result<Vec<ThemeEngagementRow>, DbError> {
    let sql = format!(
        "{LATEST_SNAPSHOTS} \
         SELECT r.theme, \
                COUNT(*)::BIGINT AS posts, \
                COALESCE(SUM(l.reach), 0)::BIGINT AS total_reach, \
                COALESCE(AVG(l.engagement_rate), 0)::DOUBLE PRECISION AS avg_engagement_rate \
         FROM latest l \
         JOIN published_posts p ON p.id = l.published_post_id \
         JOIN reels r ON r.id = p.reel_id \
         GROUP BY r.theme \
         ORDER BY avg_engagement_rate DESC, r.theme ASC"
    );
    let rows = sqlx::query_as::<_, ThemeEngagementRow>(&sql)
        .bind(days)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Best-performing publications from the last `days` days.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn top_posts(pool: &PgPool, days: i32, limit: i64) -> Result<Vec<TopPostRow>, DbError> {
    let sql = format!(
        "{LATEST_SNAPSHOTS} \
         SELECT p.id AS published_post_id, p.reel_id, r.theme, p.external_media_id, \
                p.permalink, p.published_at, l.likes, l.reach, l.engagement_rate \
         FROM latest l \
         JOIN published_posts p ON p.id = l.published_post_id \
         JOIN reels r ON r.id = p.reel_id \
         ORDER BY l.engagement_rate DESC, p.published_at DESC \
         LIMIT $2"
    );
    let rows = sqlx::query_as::<_, TopPostRow>(&sql)
        .bind(days)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}
