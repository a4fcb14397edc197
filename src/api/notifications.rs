use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::json;

use crate::models::notification::NotificationRecord;

use super::{authenticate, require_admin, run_blocking, ApiResult, AppState};

pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<NotificationRecord>>> {
    let user = authenticate(&state, &headers).await?;
    let notifications = state.notifications.clone();
    let records = run_blocking(move || notifications.list_for(&user.id)).await?;
    Ok(Json(records))
}

pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    let user = authenticate(&state, &headers).await?;
    require_admin(&user)?;

    let notifications = state.notifications.clone();
    let written = run_blocking(move || notifications.refresh_due_reminders()).await?;
    Ok(Json(json!({ "message": "到期提醒已刷新", "written": written })))
}
