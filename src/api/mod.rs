use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::json;

use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::user::{UserRecord, UserRole};
use crate::services::activity_service::ActivityService;
use crate::services::auth_service::AuthService;
use crate::services::evaluation_service::EvaluationService;
use crate::services::import_service::ImportService;
use crate::services::kpi_service::KpiService;
use crate::services::notification_service::NotificationService;
use crate::services::task_service::TaskService;
use crate::services::user_service::UserService;

mod attendance;
mod auth;
mod imports;
mod kpi;
mod notifications;
mod tasks;
mod users;

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub users: Arc<UserService>,
    pub tasks: Arc<TaskService>,
    pub kpi: Arc<KpiService>,
    pub evaluation: Arc<EvaluationService>,
    pub imports: Arc<ImportService>,
    pub notifications: Arc<NotificationService>,
    pub activity: Arc<ActivityService>,
}

impl AppState {
    pub fn new(db: DbPool) -> Self {
        let users = UserService::new(db.clone());
        let activity = ActivityService::new(db.clone());
        Self {
            auth: Arc::new(AuthService::new(
                db.clone(),
                users.clone(),
                activity.clone(),
            )),
            users: Arc::new(users),
            tasks: Arc::new(TaskService::new(db.clone())),
            kpi: Arc::new(KpiService::new(db.clone())),
            evaluation: Arc::new(EvaluationService::new(db.clone())),
            imports: Arc::new(ImportService::new(db.clone())),
            notifications: Arc::new(NotificationService::new(db.clone())),
            activity: Arc::new(activity),
        }
    }
}

pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/signin", post(auth::signin))
        .route("/api/auth/signout", post(auth::signout))
        .route("/api/auth/session", get(auth::session))
        .route("/api/tasks", get(tasks::list).post(tasks::create))
        .route(
            "/api/tasks/{id}",
            get(tasks::fetch).put(tasks::update).delete(tasks::remove),
        )
        .route("/api/tasks/{id}/mark", put(tasks::mark))
        .route("/api/reminders/due-soon", get(tasks::due_soon))
        .route("/api/reminders/delayed", get(tasks::delayed))
        .route("/api/reminders/overdue", get(tasks::overdue))
        .route("/api/evaluation", get(tasks::evaluate_all))
        .route("/api/evaluation/{user_id}", get(tasks::evaluate_one))
        .route("/api/kpi", post(kpi::record))
        .route("/api/kpi/{user_id}", get(kpi::summary))
        .route("/api/users", get(users::list).post(users::create))
        .route(
            "/api/users/{id}",
            put(users::update).delete(users::remove),
        )
        .route("/api/imports/tasks", post(imports::tasks))
        .route("/api/imports/users", post(imports::users))
        .route("/api/attendance", get(attendance::list))
        .route("/api/notifications", get(notifications::list))
        .route("/api/notifications/refresh", post(notifications::refresh))
        .with_state(state)
}

async fn health(State(_state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// HTTP-facing error. Internal failures collapse to a generic body; the
/// specifics stay in the logs.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!(target: "app::api", %message, "internal error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "服务器内部错误")
    }
}

impl From<AppError> for ApiError {
    fn from(error: AppError) -> Self {
        match error {
            AppError::Validation { message, details } => Self {
                status: StatusCode::BAD_REQUEST,
                message,
                details,
            },
            AppError::Unauthorized => Self::new(StatusCode::UNAUTHORIZED, "身份验证失败"),
            AppError::Forbidden => Self::new(StatusCode::FORBIDDEN, "无权执行该操作"),
            AppError::NotFound => Self::new(StatusCode::NOT_FOUND, "记录未找到"),
            AppError::Conflict { message } => Self::new(StatusCode::CONFLICT, message),
            other => Self::internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.details {
            Some(details) => json!({ "error": self.message, "details": details }),
            None => json!({ "error": self.message }),
        };
        (self.status, Json(body)).into_response()
    }
}

pub(crate) type ApiResult<T> = Result<T, ApiError>;

/// Runs a synchronous service call off the async runtime.
pub(crate) async fn run_blocking<T, F>(func: F) -> ApiResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(func).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(err) => Err(ApiError::internal(format!("后台任务失败: {err}"))),
    }
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> ApiResult<String> {
    let value = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::from(AppError::unauthorized()))?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::from(AppError::unauthorized()))?;
    Ok(token.to_string())
}

pub(crate) async fn authenticate(state: &AppState, headers: &HeaderMap) -> ApiResult<UserRecord> {
    let token = bearer_token(headers)?;
    let auth = state.auth.clone();
    run_blocking(move || auth.authenticate(&token)).await
}

pub(crate) fn require_admin(user: &UserRecord) -> ApiResult<()> {
    if user.role != UserRole::Admin {
        return Err(ApiError::from(AppError::forbidden()));
    }
    Ok(())
}
