//! Database operations for the `assets` catalogue.

use chrono::{DateTime, Utc};
use reelbot_core::{Asset, AssetKind, NewAsset};
use sqlx::{PgExecutor, PgPool};

use crate::DbError;

const ASSET_COLUMNS: &str = "id, kind, locator, author, tags, duration_secs, quality_score, \
                             usage_count, last_used_at, created_at";

/// A row from the `assets` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AssetRow {
    pub id: i64,
    pub kind: String,
    pub locator: String,
    pub author: Option<String>,
    pub tags: Vec<String>,
    pub duration_secs: Option<f64>,
    pub quality_score: Option<f64>,
    pub usage_count: i32,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<AssetRow> for Asset {
    type Error = DbError;

    fn try_from(row: AssetRow) -> Result<Self, Self::Error> {
        Ok(Asset {
            id: row.id,
            kind: row.kind.parse()?,
            locator: row.locator,
            author: row.author,
            tags: row.tags,
            duration_secs: row.duration_secs,
            quality_score: row.quality_score,
            usage_count: row.usage_count,
            last_used_at: row.last_used_at,
            created_at: row.created_at,
        })
    }
}

/// Per-kind catalogue counts for operator output.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AssetInventoryRow {
    pub kind: String,
    pub total: i64,
    pub never_used: i64,
}

/// Catalogues an asset. Re-adding an existing `(kind, locator)` refreshes its
/// tags and descriptive fields but leaves usage tracking untouched.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn insert_asset(pool: &PgPool, asset: &NewAsset) -> Result<AssetRow, DbError> {
    let sql = format!(
        "INSERT INTO assets (kind, locator, author, tags, duration_secs, quality_score) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (kind, locator) DO UPDATE SET \
             author        = EXCLUDED.author, \
             tags          = EXCLUDED.tags, \
             duration_secs = EXCLUDED.duration_secs, \
             quality_score = EXCLUDED.quality_score \
         RETURNING {ASSET_COLUMNS}"
    );
    let tags: Vec<String> = asset
        .tags
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();

    let row = sqlx::query_as::<_, AssetRow>(&sql)
        .bind(asset.kind.as_str())
        .bind(&asset.locator)
        .bind(asset.author.as_deref())
        .bind(&tags)
        .bind(asset.duration_secs)
        .bind(asset.quality_score)
        .fetch_one(pool)
        .await?;

    Ok(row)
}

/// Fetches a single asset by `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] if
/// the query fails.
pub async fn get_asset(pool: &PgPool, id: i64) -> Result<AssetRow, DbError> {
    let sql = format!("SELECT {ASSET_COLUMNS} FROM assets WHERE id = $1");
    sqlx::query_as::<_, AssetRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Lists assets, optionally restricted to one kind, least used first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_assets(
    pool: &PgPool,
    kind: Option<AssetKind>,
    limit: i64,
) -> Result<Vec<AssetRow>, DbError> {
    let sql = format!(
        "SELECT {ASSET_COLUMNS} FROM assets \
         WHERE ($1::TEXT IS NULL OR kind = $1) \
         ORDER BY usage_count ASC, id ASC \
         LIMIT $2"
    );
    let rows = sqlx::query_as::<_, AssetRow>(&sql)
        .bind(kind.map(AssetKind::as_str))
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Assets of `kind` carrying at least one of `tags`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_candidates(
    pool: &PgPool,
    kind: AssetKind,
    tags: &[String],
) -> Result<Vec<AssetRow>, DbError> {
    let sql = format!(
        "SELECT {ASSET_COLUMNS} FROM assets \
         WHERE kind = $1 AND tags && $2 \
         ORDER BY id ASC"
    );
    let rows = sqlx::query_as::<_, AssetRow>(&sql)
        .bind(kind.as_str())
        .bind(tags)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Increments `usage_count` in place and stamps `last_used_at`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the asset does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn record_usage(pool: &PgPool, id: i64, at: DateTime<Utc>) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE assets \
         SET usage_count = usage_count + 1, last_used_at = $2 \
         WHERE id = $1",
    )
    .bind(id)
    .bind(at)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

/// Decrements `usage_count` (floored at zero) for each of `ids` and
/// recomputes `last_used_at` from the reels that still hold usage.
///
/// Shared by reel rejection, which runs it inside the rejecting transaction
/// after the reel has left the usage-holding statuses.
pub(crate) async fn roll_back_usage<'e, E>(executor: E, ids: &[i64]) -> Result<u64, DbError>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        "UPDATE assets a \
         SET usage_count = GREATEST(a.usage_count - 1, 0), \
             last_used_at = CASE \
                 WHEN a.usage_count <= 1 THEN NULL \
                 ELSE COALESCE( \
                     (SELECT MAX(r.created_at) FROM reels r \
                      WHERE r.status <> 'rejected' \
                        AND a.id IN (r.video_id, r.audio_id, r.quote_id)), \
                     a.last_used_at) \
             END \
         WHERE a.id = ANY($1)",
    )
    .bind(ids)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Undoes one [`record_usage`] for a combination that never became a reel.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the asset does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn release_usage(pool: &PgPool, id: i64) -> Result<(), DbError> {
    if roll_back_usage(pool, &[id]).await? == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Counts catalogued assets per kind.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn asset_inventory(pool: &PgPool) -> Result<Vec<AssetInventoryRow>, DbError> {
    let rows = sqlx::query_as::<_, AssetInventoryRow>(
        "SELECT kind, \
                COUNT(*)::BIGINT AS total, \
                COUNT(*) FILTER (WHERE usage_count = 0)::BIGINT AS never_used \
         FROM assets \
         GROUP BY kind \
         ORDER BY kind",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
