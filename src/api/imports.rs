use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use crate::models::import::ImportReport;

use super::{authenticate, require_admin, run_blocking, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct ImportPayload {
    pub csv: String,
}

pub async fn tasks(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ImportPayload>,
) -> ApiResult<Json<ImportReport>> {
    let user = authenticate(&state, &headers).await?;
    require_admin(&user)?;

    let imports = state.imports.clone();
    let activity = state.activity.clone();
    let report = run_blocking(move || {
        let report = imports.import_tasks(&payload.csv)?;
        activity.record(
            &user.id,
            "tasks_imported",
            Some(format!("accepted={} skipped={}", report.accepted, report.skipped)),
        )?;
        Ok(report)
    })
    .await?;
    Ok(Json(report))
}

pub async fn users(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ImportPayload>,
) -> ApiResult<Json<ImportReport>> {
    let user = authenticate(&state, &headers).await?;
    require_admin(&user)?;

    let imports = state.imports.clone();
    let activity = state.activity.clone();
    let report = run_blocking(move || {
        let report = imports.import_users(&payload.csv)?;
        activity.record(
            &user.id,
            "users_imported",
            Some(format!("accepted={} skipped={}", report.accepted, report.skipped)),
        )?;
        Ok(report)
    })
    .await?;
    Ok(Json(report))
}
