use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use reelbot_core::{Reel, ReelStatus, ScheduledPost};
use reelbot_engine::{CycleReport, PublishNowError};
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{
    map_lifecycle_error, map_store_error, normalize_limit, ApiError, ApiResponse, AppState,
    ResponseMeta,
};

#[derive(Debug, Deserialize)]
pub(super) struct ReelsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct ApproveRequest {
    #[serde(default)]
    pub scheduled_time: Option<DateTime<Utc>>,
}

pub(super) async fn list_reels(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ReelsQuery>,
) -> Result<Json<ApiResponse<Vec<Reel>>>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<ReelStatus>)
        .transpose()
        .map_err(|e| ApiError::new(req_id.0.clone(), "validation_error", e.to_string()))?;

    let data = state
        .services
        .lifecycle
        .list(status, normalize_limit(query.limit))
        .await
        .map_err(|e| map_lifecycle_error(req_id.0.clone(), e))?;

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_reel(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(reel_id): Path<i64>,
) -> Result<Json<ApiResponse<Reel>>, ApiError> {
    let data = state
        .services
        .lifecycle
        .get(reel_id)
        .await
        .map_err(|e| map_lifecycle_error(req_id.0.clone(), e))?;

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// Approves a pending reel. An empty body schedules it at the next posting
/// slot.
pub(super) async fn approve_reel(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(reel_id): Path<i64>,
    body: Bytes,
) -> Result<Json<ApiResponse<ScheduledPost>>, ApiError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        ApproveRequest::default()
    } else {
        serde_json::from_slice::<ApproveRequest>(&body).map_err(|e| {
            ApiError::new(
                req_id.0.clone(),
                "bad_request",
                format!("invalid approve request: {e}"),
            )
        })?
    };

    let data = state
        .services
        .lifecycle
        .approve(reel_id, request.scheduled_time)
        .await
        .map_err(|e| map_lifecycle_error(req_id.0.clone(), e))?;

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn reject_reel(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(reel_id): Path<i64>,
) -> Result<Json<ApiResponse<Reel>>, ApiError> {
    let data = state
        .services
        .lifecycle
        .reject(reel_id)
        .await
        .map_err(|e| map_lifecycle_error(req_id.0.clone(), e))?;

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// Pulls a reel's scheduled post forward to now and runs a publication
/// cycle, serialised with the periodic publish job.
pub(super) async fn publish_now(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(reel_id): Path<i64>,
) -> Result<Json<ApiResponse<CycleReport>>, ApiError> {
    let Some(publication) = state.services.publication.as_ref() else {
        return Err(ApiError::new(
            req_id.0,
            "unavailable",
            "publishing is disabled: Graph API credentials are not configured",
        ));
    };

    let _guard = state.publish_lock.lock().await;
    let data = publication
        .publish_now(reel_id)
        .await
        .map_err(|e| match e {
            PublishNowError::NotScheduled(_) | PublishNowError::AlreadyFinished { .. } => {
                ApiError::new(req_id.0.clone(), "conflict", e.to_string())
            }
            PublishNowError::Store(store) => map_store_error(req_id.0.clone(), store),
        })?;

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
