use axum::{
    extract::{Query, State},
    Extension, Json,
};
use reelbot_core::{PostStatus, QueueStatus, ScheduledPost};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{
    map_lifecycle_error, map_store_error, normalize_limit, ApiError, ApiResponse, AppState,
    ResponseMeta,
};

#[derive(Debug, Deserialize)]
pub(super) struct ScheduledQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct QueueView {
    #[serde(flatten)]
    counts: QueueStatus,
    backlog: i64,
}

pub(super) async fn queue_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<QueueView>>, ApiError> {
    let counts = state
        .services
        .lifecycle
        .queue_status()
        .await
        .map_err(|e| map_lifecycle_error(req_id.0.clone(), e))?;

    Ok(Json(ApiResponse {
        data: QueueView {
            backlog: counts.backlog(),
            counts,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn list_scheduled(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ScheduledQuery>,
) -> Result<Json<ApiResponse<Vec<ScheduledPost>>>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<PostStatus>)
        .transpose()
        .map_err(|e| ApiError::new(req_id.0.clone(), "validation_error", e.to_string()))?;

    let data = state
        .store
        .list_scheduled_posts(status, normalize_limit(query.limit))
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), e))?;

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
