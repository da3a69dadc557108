//! Database operations for `scheduled_posts` and the publication outcome
//! transactions.
//!
//! A publication cycle claims due posts by stamping a `claim_token` and a
//! `claimed_until` lease. Every outcome write presents the token, so a cycle
//! whose lease was taken over can never record a result.

use chrono::{DateTime, Utc};
use reelbot_core::{
    DuePost, FailureDisposition, PostStatus, PublishResult, ReelEvent, ScheduledPost,
};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::published_posts::PublishedPostRow;
use crate::DbError;

const POST_COLUMNS: &str = "id, reel_id, scheduled_time, status, retry_count, error_message, \
                            created_at, published_at";

/// A row from the `scheduled_posts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScheduledPostRow {
    pub id: i64,
    pub reel_id: i64,
    pub scheduled_time: DateTime<Utc>,
    pub status: String,
    pub retry_count: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl TryFrom<ScheduledPostRow> for ScheduledPost {
    type Error = DbError;

    fn try_from(row: ScheduledPostRow) -> Result<Self, Self::Error> {
        Ok(ScheduledPost {
            id: row.id,
            reel_id: row.reel_id,
            scheduled_time: row.scheduled_time,
            status: row.status.parse()?,
            retry_count: row.retry_count,
            error_message: row.error_message,
            created_at: row.created_at,
            published_at: row.published_at,
        })
    }
}

/// A claimed post joined with the reel fields the publisher needs.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DuePostRow {
    pub id: i64,
    pub reel_id: i64,
    pub scheduled_time: DateTime<Utc>,
    pub status: String,
    pub retry_count: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub claim_token: Uuid,
    pub output_locator: String,
    pub caption: String,
}

impl TryFrom<DuePostRow> for DuePost {
    type Error = DbError;

    fn try_from(row: DuePostRow) -> Result<Self, Self::Error> {
        Ok(DuePost {
            post: ScheduledPost {
                id: row.id,
                reel_id: row.reel_id,
                scheduled_time: row.scheduled_time,
                status: row.status.parse()?,
                retry_count: row.retry_count,
                error_message: row.error_message,
                created_at: row.created_at,
                published_at: row.published_at,
            },
            claim_token: row.claim_token,
            output_locator: row.output_locator,
            caption: row.caption,
        })
    }
}

/// Fetches a single scheduled post by `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] if
/// the query fails.
pub async fn get_scheduled_post<'e, E>(executor: E, id: i64) -> Result<ScheduledPostRow, DbError>
where
    E: PgExecutor<'e>,
{
    let sql = format!("SELECT {POST_COLUMNS} FROM scheduled_posts WHERE id = $1");
    sqlx::query_as::<_, ScheduledPostRow>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or(DbError::NotFound)
}

/// Fetches the scheduled post created when `reel_id` was approved.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the reel was never scheduled, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn scheduled_post_for_reel(
    pool: &PgPool,
    reel_id: i64,
) -> Result<ScheduledPostRow, DbError> {
    let sql = format!("SELECT {POST_COLUMNS} FROM scheduled_posts WHERE reel_id = $1");
    sqlx::query_as::<_, ScheduledPostRow>(&sql)
        .bind(reel_id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Lists scheduled posts in posting order, optionally filtered by status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_scheduled_posts(
    pool: &PgPool,
    status: Option<PostStatus>,
    limit: i64,
) -> Result<Vec<ScheduledPostRow>, DbError> {
    let sql = format!(
        "SELECT {POST_COLUMNS} FROM scheduled_posts \
         WHERE ($1::TEXT IS NULL OR status = $1) \
         ORDER BY scheduled_time ASC, id ASC \
         LIMIT $2"
    );
    let rows = sqlx::query_as::<_, ScheduledPostRow>(&sql)
        .bind(status.map(PostStatus::as_str))
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Leases up to `limit` due pending posts for one publication cycle.
///
/// Rows locked by a concurrent claim are skipped, as are posts whose lease
/// has not yet expired. The result is ordered oldest `scheduled_time` first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the claim fails.
pub async fn claim_due_posts(
    pool: &PgPool,
    now: DateTime<Utc>,
    lease_until: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<DuePostRow>, DbError> {
    let claim_token = Uuid::new_v4();

    let mut rows = sqlx::query_as::<_, DuePostRow>(
        "WITH due AS ( \
             SELECT id FROM scheduled_posts \
             WHERE status = 'pending' \
               AND scheduled_time <= $1 \
               AND (claimed_until IS NULL OR claimed_until <= $1) \
             ORDER BY scheduled_time ASC, id ASC \
             LIMIT $3 \
             FOR UPDATE SKIP LOCKED \
         ) \
         UPDATE scheduled_posts sp \
         SET claim_token = $4, claimed_until = $2 \
         FROM due, reels r \
         WHERE sp.id = due.id AND r.id = sp.reel_id \
         RETURNING sp.id, sp.reel_id, sp.scheduled_time, sp.status, sp.retry_count, \
                   sp.error_message, sp.created_at, sp.published_at, sp.claim_token, \
                   r.output_locator, r.caption",
    )
    .bind(now)
    .bind(lease_until)
    .bind(limit)
    .bind(claim_token)
    .fetch_all(pool)
    .await?;

    rows.sort_by(|a, b| (a.scheduled_time, a.id).cmp(&(b.scheduled_time, b.id)));
    Ok(rows)
}

/// Resolves a lost lease check into `NotFound`, a status conflict, or
/// [`DbError::LeaseLost`].
async fn lease_conflict<'e, E>(executor: E, post_id: i64) -> DbError
where
    E: PgExecutor<'e>,
{
    match get_scheduled_post(executor, post_id).await {
        Ok(row) => match row.status.parse::<PostStatus>() {
            Ok(PostStatus::Pending) => DbError::LeaseLost { post_id },
            Ok(actual) => DbError::PostStatusConflict { post_id, actual },
            Err(e) => DbError::Decode(e),
        },
        Err(e) => e,
    }
}

/// Records a successful publication.
///
/// In one transaction: mark the post published and release its lease,
/// insert the `published_posts` row, and move the reel scheduled ->
/// published. Nothing is written unless the claim is still held.
///
/// # Errors
///
/// Returns [`DbError::LeaseLost`] or [`DbError::PostStatusConflict`] if the
/// claim is stale, [`DbError::ReelStatusConflict`] if the reel is not
/// scheduled, or [`DbError::Sqlx`] if any statement fails.
pub async fn complete_publication(
    pool: &PgPool,
    claim: &DuePost,
    result: &PublishResult,
    published_at: DateTime<Utc>,
) -> Result<PublishedPostRow, DbError> {
    let post_id = claim.post.id;
    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        "UPDATE scheduled_posts \
         SET status = 'published', published_at = $3, error_message = NULL, \
             claim_token = NULL, claimed_until = NULL \
         WHERE id = $1 AND status = 'pending' AND claim_token = $2",
    )
    .bind(post_id)
    .bind(claim.claim_token)
    .bind(published_at)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        let err = lease_conflict(&mut *tx, post_id).await;
        tx.rollback().await?;
        return Err(err);
    }

    let published = sqlx::query_as::<_, PublishedPostRow>(
        "INSERT INTO published_posts \
             (scheduled_post_id, reel_id, external_media_id, permalink, caption, published_at) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING id, scheduled_post_id, reel_id, external_media_id, permalink, caption, \
                   published_at",
    )
    .bind(post_id)
    .bind(claim.post.reel_id)
    .bind(&result.external_media_id)
    .bind(result.permalink.as_deref())
    .bind(&claim.caption)
    .bind(published_at)
    .fetch_one(&mut *tx)
    .await?;

    if let Err(err) =
        crate::reels::finish_scheduled_reel(&mut tx, claim.post.reel_id, ReelEvent::Publish).await
    {
        tx.rollback().await?;
        return Err(err);
    }

    tx.commit().await?;
    Ok(published)
}

/// Records a failed attempt under the claim.
///
/// `Retry` keeps the post pending with the new `retry_count`, pushes
/// `scheduled_time` to the next attempt, and drops the lease. `Exhausted`
/// marks the post failed and moves the reel scheduled -> failed in the same
/// transaction.
///
/// # Errors
///
/// Returns [`DbError::LeaseLost`] or [`DbError::PostStatusConflict`] if the
/// claim is stale, or [`DbError::Sqlx`] if any statement fails.
pub async fn record_failed_attempt(
    pool: &PgPool,
    claim: &DuePost,
    error_message: &str,
    disposition: FailureDisposition,
) -> Result<ScheduledPostRow, DbError> {
    let post_id = claim.post.id;
    let mut tx = pool.begin().await?;

    let row = match disposition {
        FailureDisposition::Retry {
            retry_count,
            next_attempt_at,
        } => {
            let sql = format!(
                "UPDATE scheduled_posts \
                 SET retry_count = $3, error_message = $4, scheduled_time = $5, \
                     claim_token = NULL, claimed_until = NULL \
                 WHERE id = $1 AND status = 'pending' AND claim_token = $2 \
                 RETURNING {POST_COLUMNS}"
            );
            sqlx::query_as::<_, ScheduledPostRow>(&sql)
                .bind(post_id)
                .bind(claim.claim_token)
                .bind(retry_count)
                .bind(error_message)
                .bind(next_attempt_at)
                .fetch_optional(&mut *tx)
                .await?
        }
        FailureDisposition::Exhausted { retry_count } => {
            let sql = format!(
                "UPDATE scheduled_posts \
                 SET status = 'failed', retry_count = $3, error_message = $4, \
                     claim_token = NULL, claimed_until = NULL \
                 WHERE id = $1 AND status = 'pending' AND claim_token = $2 \
                 RETURNING {POST_COLUMNS}"
            );
            sqlx::query_as::<_, ScheduledPostRow>(&sql)
                .bind(post_id)
                .bind(claim.claim_token)
                .bind(retry_count)
                .bind(error_message)
                .fetch_optional(&mut *tx)
                .await?
        }
    };

    let Some(row) = row else {
        let err = lease_conflict(&mut *tx, post_id).await;
        tx.rollback().await?;
        return Err(err);
    };

    if matches!(disposition, FailureDisposition::Exhausted { .. }) {
        if let Err(err) =
            crate::reels::finish_scheduled_reel(&mut tx, claim.post.reel_id, ReelEvent::Fail)
                .await
        {
            tx.rollback().await?;
            return Err(err);
        }
    }

    tx.commit().await?;
    Ok(row)
}

/// Moves a pending post to a new `scheduled_time`.
///
/// # Errors
///
/// Returns [`DbError::PostStatusConflict`] if the post is already
/// published or failed, [`DbError::NotFound`] if it does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn reschedule_post(
    pool: &PgPool,
    id: i64,
    scheduled_time: DateTime<Utc>,
) -> Result<ScheduledPostRow, DbError> {
    let sql = format!(
        "UPDATE scheduled_posts SET scheduled_time = $2 \
         WHERE id = $1 AND status = 'pending' \
         RETURNING {POST_COLUMNS}"
    );
    let row = sqlx::query_as::<_, ScheduledPostRow>(&sql)
        .bind(id)
        .bind(scheduled_time)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(row),
        None => {
            let current = get_scheduled_post(pool, id).await?;
            Err(DbError::PostStatusConflict {
                post_id: id,
                actual: current.status.parse()?,
            })
        }
    }
}
