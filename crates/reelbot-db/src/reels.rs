//! Database operations for `reels`.
//!
//! Status changes are compare-and-set updates keyed on the expected prior
//! status. The target status always comes from [`ReelStatus::apply`].

use chrono::{DateTime, Utc};
use reelbot_core::{NewReel, QueueStatus, Reel, ReelEvent, ReelStatus, RenderMetadata};
use sqlx::{types::Json, PgExecutor, PgPool};

use crate::scheduled_posts::ScheduledPostRow;
use crate::DbError;

const REEL_COLUMNS: &str = "id, video_id, audio_id, quote_id, theme, output_locator, caption, \
                            status, render_metadata, created_at, approved_at";

/// A row from the `reels` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReelRow {
    pub id: i64,
    pub video_id: i64,
    pub audio_id: i64,
    pub quote_id: i64,
    pub theme: String,
    pub output_locator: String,
    pub caption: String,
    pub status: String,
    pub render_metadata: Json<RenderMetadata>,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
}

impl TryFrom<ReelRow> for Reel {
    type Error = DbError;

    fn try_from(row: ReelRow) -> Result<Self, Self::Error> {
        Ok(Reel {
            id: row.id,
            video_id: row.video_id,
            audio_id: row.audio_id,
            quote_id: row.quote_id,
            theme: row.theme,
            output_locator: row.output_locator,
            caption: row.caption,
            status: row.status.parse()?,
            render: row.render_metadata.0,
            created_at: row.created_at,
            approved_at: row.approved_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StatusCountRow {
    status: String,
    count: i64,
}

/// Registers a rendered reel in `pending` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails (including a foreign-key
/// violation for an unknown asset id).
pub async fn insert_reel(
    pool: &PgPool,
    reel: &NewReel,
    created_at: DateTime<Utc>,
) -> Result<ReelRow, DbError> {
    let sql = format!(
        "INSERT INTO reels \
             (video_id, audio_id, quote_id, theme, output_locator, caption, status, \
              render_metadata, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         RETURNING {REEL_COLUMNS}"
    );
    let row = sqlx::query_as::<_, ReelRow>(&sql)
        .bind(reel.video_id)
        .bind(reel.audio_id)
        .bind(reel.quote_id)
        .bind(&reel.theme)
        .bind(&reel.output_locator)
        .bind(&reel.caption)
        .bind(ReelStatus::Pending.as_str())
        .bind(Json(&reel.render))
        .bind(created_at)
        .fetch_one(pool)
        .await?;

    Ok(row)
}

/// Fetches a single reel by `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] if
/// the query fails.
pub async fn get_reel<'e, E>(executor: E, id: i64) -> Result<ReelRow, DbError>
where
    E: PgExecutor<'e>,
{
    let sql = format!("SELECT {REEL_COLUMNS} FROM reels WHERE id = $1");
    sqlx::query_as::<_, ReelRow>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or(DbError::NotFound)
}

/// Lists reels newest first, optionally filtered by status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_reels(
    pool: &PgPool,
    status: Option<ReelStatus>,
    limit: i64,
) -> Result<Vec<ReelRow>, DbError> {
    let sql = format!(
        "SELECT {REEL_COLUMNS} FROM reels \
         WHERE ($1::TEXT IS NULL OR status = $1) \
         ORDER BY created_at DESC, id DESC \
         LIMIT $2"
    );
    let rows = sqlx::query_as::<_, ReelRow>(&sql)
        .bind(status.map(ReelStatus::as_str))
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Counts reels per lifecycle status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or [`DbError::Decode`] if a
/// row carries an unknown status.
pub async fn queue_status(pool: &PgPool) -> Result<QueueStatus, DbError> {
    let rows = sqlx::query_as::<_, StatusCountRow>(
        "SELECT status, COUNT(*)::BIGINT AS count FROM reels GROUP BY status",
    )
    .fetch_all(pool)
    .await?;

    let mut status = QueueStatus::default();
    for row in rows {
        status.add(row.status.parse()?, row.count);
    }
    Ok(status)
}

/// Resolves a lost compare-and-set into `NotFound` or a status conflict.
async fn reel_conflict<'e, E>(executor: E, id: i64) -> DbError
where
    E: PgExecutor<'e>,
{
    match get_reel(executor, id).await {
        Ok(row) => match row.status.parse() {
            Ok(actual) => DbError::ReelStatusConflict {
                reel_id: id,
                actual,
            },
            Err(e) => DbError::Decode(e),
        },
        Err(e) => e,
    }
}

async fn set_reel_status<'e, E>(
    executor: E,
    id: i64,
    from: ReelStatus,
    to: ReelStatus,
) -> Result<u64, DbError>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query("UPDATE reels SET status = $3 WHERE id = $1 AND status = $2")
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

/// Approves a pending reel and schedules it for `scheduled_time`.
///
/// In one transaction: pending -> approved (stamping `approved_at`), insert
/// the `scheduled_posts` row, approved -> scheduled.
///
/// # Errors
///
/// Returns [`DbError::ReelStatusConflict`] if the reel is not pending,
/// [`DbError::NotFound`] if it does not exist, or [`DbError::Sqlx`] if any
/// statement fails.
pub async fn approve_reel(
    pool: &PgPool,
    id: i64,
    approved_at: DateTime<Utc>,
    scheduled_time: DateTime<Utc>,
) -> Result<ScheduledPostRow, DbError> {
    let approved = ReelStatus::Pending
        .apply(ReelEvent::Approve)
        .map_err(|e| DbError::ReelStatusConflict {
            reel_id: id,
            actual: e.from,
        })?;
    let scheduled = approved
        .apply(ReelEvent::Schedule)
        .map_err(|e| DbError::ReelStatusConflict {
            reel_id: id,
            actual: e.from,
        })?;

    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "UPDATE reels SET status = $3, approved_at = $4 \
         WHERE id = $1 AND status = $2",
    )
    .bind(id)
    .bind(ReelStatus::Pending.as_str())
    .bind(approved.as_str())
    .bind(approved_at)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        let err = reel_conflict(&mut *tx, id).await;
        tx.rollback().await?;
        return Err(err);
    }

    let post = sqlx::query_as::<_, ScheduledPostRow>(
        "INSERT INTO scheduled_posts (reel_id, scheduled_time) \
         VALUES ($1, $2) \
         RETURNING id, reel_id, scheduled_time, status, retry_count, error_message, \
                   created_at, published_at",
    )
    .bind(id)
    .bind(scheduled_time)
    .fetch_one(&mut *tx)
    .await?;

    if set_reel_status(&mut *tx, id, approved, scheduled).await? == 0 {
        let err = reel_conflict(&mut *tx, id).await;
        tx.rollback().await?;
        return Err(err);
    }

    tx.commit().await?;
    Ok(post)
}

/// Rejects a pending reel and rolls back the usage it recorded.
///
/// In one transaction: pending -> rejected, then decrement `usage_count` on
/// the three referenced assets and recompute their `last_used_at`.
///
/// # Errors
///
/// Returns [`DbError::ReelStatusConflict`] if the reel is not pending,
/// [`DbError::NotFound`] if it does not exist, or [`DbError::Sqlx`] if any
/// statement fails.
pub async fn reject_reel(pool: &PgPool, id: i64) -> Result<ReelRow, DbError> {
    let rejected = ReelStatus::Pending
        .apply(ReelEvent::Reject)
        .map_err(|e| DbError::ReelStatusConflict {
            reel_id: id,
            actual: e.from,
        })?;

    let mut tx = pool.begin().await?;

    let sql = format!(
        "UPDATE reels SET status = $3 \
         WHERE id = $1 AND status = $2 \
         RETURNING {REEL_COLUMNS}"
    );
    let row = sqlx::query_as::<_, ReelRow>(&sql)
        .bind(id)
        .bind(ReelStatus::Pending.as_str())
        .bind(rejected.as_str())
        .fetch_optional(&mut *tx)
        .await?;

    let Some(row) = row else {
        let err = reel_conflict(&mut *tx, id).await;
        tx.rollback().await?;
        return Err(err);
    };

    crate::assets::roll_back_usage(&mut *tx, &[row.video_id, row.audio_id, row.quote_id])
        .await?;

    tx.commit().await?;
    Ok(row)
}

/// Scheduled -> `to` inside an outcome transaction owned by the caller.
pub(crate) async fn finish_scheduled_reel(
    tx: &mut sqlx::PgConnection,
    id: i64,
    event: ReelEvent,
) -> Result<(), DbError> {
    let to = ReelStatus::Scheduled
        .apply(event)
        .map_err(|e| DbError::ReelStatusConflict {
            reel_id: id,
            actual: e.from,
        })?;
    if set_reel_status(&mut *tx, id, ReelStatus::Scheduled, to).await? == 0 {
        return Err(reel_conflict(&mut *tx, id).await);
    }
    Ok(())
}
