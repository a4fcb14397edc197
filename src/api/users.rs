use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use crate::error::AppError;
use crate::models::user::{UserCreateInput, UserDeleteReport, UserRecord, UserRole, UserUpdateInput};

use super::{authenticate, require_admin, run_blocking, ApiError, ApiResult, AppState};

pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<UserRecord>>> {
    let user = authenticate(&state, &headers).await?;
    require_admin(&user)?;

    let users = state.users.clone();
    let records = run_blocking(move || users.list_users()).await?;
    Ok(Json(records))
}

pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<UserCreateInput>,
) -> ApiResult<(StatusCode, Json<UserRecord>)> {
    let user = authenticate(&state, &headers).await?;
    require_admin(&user)?;

    let users = state.users.clone();
    let activity = state.activity.clone();
    let record = run_blocking(move || {
        let record = users.create_user(input)?;
        activity.record(&user.id, "user_created", Some(record.id.clone()))?;
        Ok(record)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(input): Json<UserUpdateInput>,
) -> ApiResult<Json<UserRecord>> {
    let user = authenticate(&state, &headers).await?;
    // Employees may edit their own profile fields; role changes stay
    // admin-only.
    if user.role != UserRole::Admin && (user.id != id || input.role.is_some()) {
        return Err(ApiError::from(AppError::forbidden()));
    }

    let users = state.users.clone();
    let activity = state.activity.clone();
    let record = run_blocking(move || {
        let record = users.update_user(&id, input)?;
        activity.record(&user.id, "user_updated", Some(record.id.clone()))?;
        Ok(record)
    })
    .await?;
    Ok(Json(record))
}

pub async fn remove(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<UserDeleteReport>> {
    let user = authenticate(&state, &headers).await?;
    require_admin(&user)?;

    let users = state.users.clone();
    let activity = state.activity.clone();
    let report = run_blocking(move || {
        let report = users.delete_user(&id)?;
        activity.record(&user.id, "user_deleted", Some(id.clone()))?;
        Ok(report)
    })
    .await?;
    Ok(Json(report))
}
