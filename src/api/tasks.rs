use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;
use crate::models::task::{TaskCreateInput, TaskRecord, TaskUpdateInput};
use crate::models::user::{UserRecord, UserRole};
use crate::services::evaluation_service::{DueReminder, EmployeeEvaluation};

use super::{authenticate, require_admin, run_blocking, ApiError, ApiResult, AppState};

pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<TaskRecord>>> {
    let user = authenticate(&state, &headers).await?;
    let tasks = state.tasks.clone();
    let records = run_blocking(move || match user.role {
        UserRole::Admin => tasks.list_tasks(),
        UserRole::Employee => tasks.list_tasks_for(&user.id),
    })
    .await?;
    Ok(Json(records))
}

pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<TaskCreateInput>,
) -> ApiResult<(StatusCode, Json<TaskRecord>)> {
    let user = authenticate(&state, &headers).await?;
    require_admin(&user)?;

    let tasks = state.tasks.clone();
    let activity = state.activity.clone();
    let record = run_blocking(move || {
        let record = tasks.create_task(input)?;
        activity.record(&user.id, "task_created", Some(record.id.clone()))?;
        Ok(record)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn fetch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<TaskRecord>> {
    let user = authenticate(&state, &headers).await?;
    let tasks = state.tasks.clone();
    let record = run_blocking(move || tasks.get_task(&id)).await?;
    ensure_task_visible(&user, &record)?;
    Ok(Json(record))
}

pub async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(update): Json<TaskUpdateInput>,
) -> ApiResult<Json<TaskRecord>> {
    let user = authenticate(&state, &headers).await?;

    let tasks = state.tasks.clone();
    let activity = state.activity.clone();
    let record = run_blocking(move || {
        if user.role != UserRole::Admin {
            let existing = tasks.get_task(&id)?;
            if existing.assignee_id.as_deref() != Some(user.id.as_str()) {
                return Err(AppError::forbidden());
            }
            if !is_status_only(&update) {
                return Err(AppError::forbidden());
            }
        }
        let record = tasks.update_task(&id, update)?;
        activity.record(&user.id, "task_updated", Some(record.id.clone()))?;
        Ok(record)
    })
    .await?;
    Ok(Json(record))
}

pub async fn remove(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let user = authenticate(&state, &headers).await?;
    require_admin(&user)?;

    let tasks = state.tasks.clone();
    let activity = state.activity.clone();
    run_blocking(move || {
        tasks.get_task(&id)?;
        tasks.delete_task(&id)?;
        activity.record(&user.id, "task_deleted", Some(id.clone()))?;
        Ok(())
    })
    .await?;
    Ok(Json(json!({ "message": "任务已删除" })))
}

#[derive(Debug, Deserialize)]
pub struct MarkPayload {
    pub mark: i64,
}

pub async fn mark(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<MarkPayload>,
) -> ApiResult<Json<TaskRecord>> {
    let user = authenticate(&state, &headers).await?;
    require_admin(&user)?;

    let tasks = state.tasks.clone();
    let activity = state.activity.clone();
    let record = run_blocking(move || {
        let record = tasks.set_closing_mark(&id, payload.mark)?;
        activity.record(&user.id, "task_marked", Some(record.id.clone()))?;
        Ok(record)
    })
    .await?;
    Ok(Json(record))
}

pub async fn due_soon(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<DueReminder>>> {
    let user = authenticate(&state, &headers).await?;
    let evaluation = state.evaluation.clone();
    let reminders =
        run_blocking(move || evaluation.due_soon(scope(&user).as_deref())).await?;
    Ok(Json(reminders))
}

#[derive(Debug, Default, Deserialize)]
pub struct DelayedQuery {
    #[serde(default)]
    pub months: Option<u32>,
}

pub async fn delayed(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<DelayedQuery>,
) -> ApiResult<Json<Vec<TaskRecord>>> {
    let user = authenticate(&state, &headers).await?;
    let evaluation = state.evaluation.clone();
    let months = query.months.unwrap_or(0);
    let records =
        run_blocking(move || evaluation.delayed(scope(&user).as_deref(), months)).await?;
    Ok(Json(records))
}

pub async fn overdue(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<TaskRecord>>> {
    let user = authenticate(&state, &headers).await?;
    let evaluation = state.evaluation.clone();
    let records = run_blocking(move || evaluation.overdue(scope(&user).as_deref())).await?;
    Ok(Json(records))
}

pub async fn evaluate_all(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<EmployeeEvaluation>>> {
    let user = authenticate(&state, &headers).await?;
    require_admin(&user)?;

    let evaluation = state.evaluation.clone();
    let evaluations = run_blocking(move || evaluation.evaluate_all()).await?;
    Ok(Json(evaluations))
}

pub async fn evaluate_one(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> ApiResult<Json<EmployeeEvaluation>> {
    let user = authenticate(&state, &headers).await?;
    ensure_self_or_admin(&user, &user_id)?;

    let evaluation = state.evaluation.clone();
    let result = run_blocking(move || evaluation.evaluate_user(&user_id)).await?;
    Ok(Json(result))
}

/// Admins see everything, employees only their own tasks.
fn scope(user: &UserRecord) -> Option<String> {
    match user.role {
        UserRole::Admin => None,
        UserRole::Employee => Some(user.id.clone()),
    }
}

fn ensure_task_visible(user: &UserRecord, record: &TaskRecord) -> ApiResult<()> {
    if user.role == UserRole::Admin || record.assignee_id.as_deref() == Some(user.id.as_str()) {
        Ok(())
    } else {
        Err(ApiError::from(AppError::forbidden()))
    }
}

pub(super) fn ensure_self_or_admin(user: &UserRecord, target_id: &str) -> ApiResult<()> {
    if user.role == UserRole::Admin || user.id == target_id {
        Ok(())
    } else {
        Err(ApiError::from(AppError::forbidden()))
    }
}

/// Employees may only report progress; everything else stays admin-owned.
fn is_status_only(update: &TaskUpdateInput) -> bool {
    update.title.is_none()
        && update.description.is_none()
        && update.priority.is_none()
        && update.assignee_id.is_none()
        && update.start_date.is_none()
        && update.end_date.is_none()
}
