use axum::{
    extract::{Query, State},
    Extension, Json,
};
use reelbot_db::{EngagementSummaryRow, ThemeEngagementRow};
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct WindowQuery {
    pub days: Option<i32>,
}

fn normalize_days(days: Option<i32>) -> i32 {
    days.unwrap_or(30).clamp(1, 365)
}

pub(super) async fn engagement_summary(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<ApiResponse<EngagementSummaryRow>>, ApiError> {
    let data = reelbot_db::engagement_summary(&state.pool, normalize_days(query.days))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), e))?;

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn engagement_by_theme(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<ApiResponse<Vec<ThemeEngagementRow>>>, ApiError> {
    let data = reelbot_db::engagement_by_theme(&state.pool, normalize_days(query.days))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), e))?;

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[cfg(test)]
mod tests {
    use super::normalize_days;

    #[test]
    fn days_default_and_clamp() {
        assert_eq!(normalize_days(None), 30);
        assert_eq!(normalize_days(Some(0)), 1);
        assert_eq!(normalize_days(Some(7)), 7);
        assert_eq!(normalize_days(Some(10_000)), 365);
    }
}
