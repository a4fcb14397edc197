use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;

use crate::models::activity::{ActivityLogFilters, ActivityLogRecord};

use super::{authenticate, require_admin, run_blocking, ApiResult, AppState};

pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(filters): Query<ActivityLogFilters>,
) -> ApiResult<Json<Vec<ActivityLogRecord>>> {
    let user = authenticate(&state, &headers).await?;
    require_admin(&user)?;

    let activity = state.activity.clone();
    let records = run_blocking(move || activity.list(filters)).await?;
    Ok(Json(records))
}
