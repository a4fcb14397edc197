use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use crate::models::kpi::{KpiScoreInput, KpiScoreRecord, KpiSummary};

use super::tasks::ensure_self_or_admin;
use super::{authenticate, require_admin, run_blocking, ApiResult, AppState};

pub async fn record(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<KpiScoreInput>,
) -> ApiResult<(StatusCode, Json<KpiScoreRecord>)> {
    let user = authenticate(&state, &headers).await?;
    require_admin(&user)?;

    let kpi = state.kpi.clone();
    let activity = state.activity.clone();
    let record = run_blocking(move || {
        let record = kpi.record_score(input, &user.id)?;
        activity.record(&user.id, "kpi_recorded", Some(record.id.clone()))?;
        Ok(record)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn summary(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> ApiResult<Json<KpiSummary>> {
    let user = authenticate(&state, &headers).await?;
    ensure_self_or_admin(&user, &user_id)?;

    let kpi = state.kpi.clone();
    let summary = run_blocking(move || kpi.summary(&user_id)).await?;
    Ok(Json(summary))
}
