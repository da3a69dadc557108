//! Read access to `published_posts`. Rows are written only by
//! [`crate::complete_publication`].

use chrono::{DateTime, Utc};
use reelbot_core::PublishedPost;
use sqlx::PgPool;

use crate::DbError;

const PUBLISHED_COLUMNS: &str =
    "id, scheduled_post_id, reel_id, external_media_id, permalink, caption, published_at";

/// A row from the `published_posts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PublishedPostRow {
    pub id: i64,
    pub scheduled_post_id: i64,
    pub reel_id: i64,
    pub external_media_id: String,
    pub permalink: Option<String>,
    pub caption: String,
    pub published_at: DateTime<Utc>,
}

impl From<PublishedPostRow> for PublishedPost {
    fn from(row: PublishedPostRow) -> Self {
        PublishedPost {
            id: row.id,
            scheduled_post_id: row.scheduled_post_id,
            reel_id: row.reel_id,
            external_media_id: row.external_media_id,
            permalink: row.permalink,
            caption: row.caption,
            published_at: row.published_at,
        }
    }
}

/// Fetches the publication record for `reel_id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the reel has not been published, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_published_post_for_reel(
    pool: &PgPool,
    reel_id: i64,
) -> Result<PublishedPostRow, DbError> {
    let sql = format!("SELECT {PUBLISHED_COLUMNS} FROM published_posts WHERE reel_id = $1");
    sqlx::query_as::<_, PublishedPostRow>(&sql)
        .bind(reel_id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Most recent publications first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_published_posts(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<PublishedPostRow>, DbError> {
    let sql = format!(
        "SELECT {PUBLISHED_COLUMNS} FROM published_posts \
         ORDER BY published_at DESC, id DESC \
         LIMIT $1"
    );
    let rows = sqlx::query_as::<_, PublishedPostRow>(&sql)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Publications old enough to measure that have no snapshot in
/// `bucket_start` yet.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn posts_due_for_metrics(
    pool: &PgPool,
    published_before: DateTime<Utc>,
    bucket_start: DateTime<Utc>,
) -> Result<Vec<PublishedPostRow>, DbError> {
    let rows = sqlx::query_as::<_, PublishedPostRow>(
        "SELECT p.id, p.scheduled_post_id, p.reel_id, p.external_media_id, p.permalink, \
                p.caption, p.published_at \
         FROM published_posts p \
         WHERE p.published_at <= $1 \
           AND NOT EXISTS ( \
               SELECT 1 FROM post_metrics m \
               WHERE m.published_post_id = p.id AND m.bucket_start = $2 \
           ) \
         ORDER BY p.published_at ASC, p.id ASC",
    )
    .bind(published_before)
    .bind(bucket_start)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
