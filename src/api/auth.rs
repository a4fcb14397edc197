use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde_json::json;

use crate::models::user::UserCreateInput;
use crate::services::auth_service::{AuthSession, SigninInput};

use super::{authenticate, bearer_token, run_blocking, ApiResult, AppState};

pub async fn signup(
    State(state): State<AppState>,
    Json(input): Json<UserCreateInput>,
) -> ApiResult<(StatusCode, Json<AuthSession>)> {
    let auth = state.auth.clone();
    let session = run_blocking(move || auth.signup(input)).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn signin(
    State(state): State<AppState>,
    Json(input): Json<SigninInput>,
) -> ApiResult<Json<AuthSession>> {
    let auth = state.auth.clone();
    let session = run_blocking(move || auth.signin(input)).await?;
    Ok(Json(session))
}

pub async fn signout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    let token = bearer_token(&headers)?;
    let auth = state.auth.clone();
    run_blocking(move || auth.signout(&token)).await?;
    Ok(Json(json!({ "message": "已退出登录" })))
}

pub async fn session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<crate::models::user::UserRecord>> {
    let user = authenticate(&state, &headers).await?;
    Ok(Json(user))
}
