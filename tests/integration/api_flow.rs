use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use teampulse::api::{api_router, AppState};
use teampulse::db::DbPool;

fn test_app() -> (Router, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("temp dir");
    let db = DbPool::new(dir.path().join("test.sqlite")).expect("db pool");
    (api_router(AppState::new(db)), dir)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    };

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

async fn signup(app: &Router, email: &str, name: &str) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/auth/signup",
        None,
        Some(json!({
            "email": email,
            "displayName": name,
            "password": "long-enough-secret",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "signup failed: {body}");
    body
}

fn token(session: &Value) -> String {
    session["token"].as_str().expect("token").to_string()
}

fn user_id(session: &Value) -> String {
    session["user"]["id"].as_str().expect("user id").to_string()
}

#[tokio::test]
async fn health_reports_ok() {
    let (app, _dir) = test_app();
    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn first_signup_is_admin_then_employees() {
    let (app, _dir) = test_app();
    let admin = signup(&app, "boss@example.com", "老板").await;
    assert_eq!(admin["user"]["role"], "admin");

    let employee = signup(&app, "emp@example.com", "员工").await;
    assert_eq!(employee["user"]["role"], "employee");

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/auth/session",
        Some(&token(&employee)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "emp@example.com");
}

#[tokio::test]
async fn signin_rejects_bad_credentials_generically() {
    let (app, _dir) = test_app();
    signup(&app, "user@example.com", "张三").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/signin",
        None,
        Some(json!({ "email": "user@example.com", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "邮箱或密码不正确");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/signin",
        None,
        Some(json!({ "email": "ghost@example.com", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "邮箱或密码不正确");
}

#[tokio::test]
async fn signout_invalidates_the_session() {
    let (app, _dir) = test_app();
    let session = signup(&app, "user@example.com", "张三").await;
    let bearer = token(&session);

    let (status, _) = send(&app, Method::POST, "/api/auth/signout", Some(&bearer), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::GET, "/api/auth/session", Some(&bearer), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn endpoints_require_authentication() {
    let (app, _dir) = test_app();
    for uri in ["/api/tasks", "/api/users", "/api/notifications"] {
        let (status, _) = send(&app, Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
    }
}

#[tokio::test]
async fn admin_endpoints_reject_employees() {
    let (app, _dir) = test_app();
    signup(&app, "boss@example.com", "老板").await;
    let employee = signup(&app, "emp@example.com", "员工").await;
    let bearer = token(&employee);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/tasks",
        Some(&bearer),
        Some(json!({ "title": "越权任务" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::GET, "/api/users", Some(&bearer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::GET, "/api/attendance", Some(&bearer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::GET, "/api/evaluation", Some(&bearer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn task_crud_with_role_scoping() {
    let (app, _dir) = test_app();
    let admin = signup(&app, "boss@example.com", "老板").await;
    let employee = signup(&app, "emp@example.com", "员工").await;
    let admin_token = token(&admin);
    let employee_token = token(&employee);
    let employee_id = user_id(&employee);

    let (status, created) = send(
        &app,
        Method::POST,
        "/api/tasks",
        Some(&admin_token),
        Some(json!({
            "title": "写季度报告",
            "assigneeId": employee_id,
            "endDate": "2030-06-01",
            "priority": "high",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let task_id = created["id"].as_str().expect("task id").to_string();

    // An unassigned task exists too; the employee must not see it.
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/tasks",
        Some(&admin_token),
        Some(json!({ "title": "后勤杂务" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, all) = send(&app, Method::GET, "/api/tasks", Some(&admin_token), None).await;
    assert_eq!(all.as_array().expect("array").len(), 2);

    let (_, own) = send(&app, Method::GET, "/api/tasks", Some(&employee_token), None).await;
    assert_eq!(own.as_array().expect("array").len(), 1);
    assert_eq!(own[0]["id"], task_id.as_str());

    // Employees may report progress on their own task.
    let (status, updated) = send(
        &app,
        Method::PUT,
        &format!("/api/tasks/{task_id}"),
        Some(&employee_token),
        Some(json!({ "status": "completed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "completed");

    // Retitling is an admin concern.
    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/tasks/{task_id}"),
        Some(&employee_token),
        Some(json!({ "title": "改标题" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, marked) = send(
        &app,
        Method::PUT,
        &format!("/api/tasks/{task_id}/mark"),
        Some(&admin_token),
        Some(json!({ "mark": 95 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(marked["closingMark"], 95);

    let (status, body) = send(
        &app,
        Method::DELETE,
        &format!("/api/tasks/{task_id}"),
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "任务已删除");

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/tasks/{task_id}"),
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn kpi_duplicate_month_conflicts_and_average_rounds() {
    let (app, _dir) = test_app();
    let admin = signup(&app, "boss@example.com", "老板").await;
    let employee = signup(&app, "emp@example.com", "员工").await;
    let admin_token = token(&admin);
    let employee_id = user_id(&employee);

    let score = |month: &str, value: f64| {
        json!({ "userId": employee_id, "year": 2024, "month": month, "score": value })
    };

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/kpi",
        Some(&admin_token),
        Some(score("March", 80.0)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/kpi",
        Some(&admin_token),
        Some(score("March", 90.0)),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().expect("error").contains("March"));

    for (month, value) in [("April", 100.0), ("May", 60.0)] {
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/kpi",
            Some(&admin_token),
            Some(score(month, value)),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, summary) = send(
        &app,
        Method::GET,
        &format!("/api/kpi/{employee_id}"),
        Some(&token(&employee)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["averageScore"], 80);
    assert_eq!(summary["scores"].as_array().expect("scores").len(), 3);
}

#[tokio::test]
async fn kpi_summary_is_private_between_employees() {
    let (app, _dir) = test_app();
    signup(&app, "boss@example.com", "老板").await;
    let first = signup(&app, "one@example.com", "甲").await;
    let second = signup(&app, "two@example.com", "乙").await;

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/kpi/{}", user_id(&second)),
        Some(&token(&first)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn csv_imports_accept_loose_headers() {
    let (app, _dir) = test_app();
    let admin = signup(&app, "boss@example.com", "老板").await;
    let admin_token = token(&admin);

    let (status, report) = send(
        &app,
        Method::POST,
        "/api/imports/tasks",
        Some(&admin_token),
        Some(json!({
            "csv": "Task Name,Start_Date,Due Date,Priority\n写方案,2024-03-01,2024-03-15,high\n,2024-03-01,2024-03-15,low\n"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["accepted"], 1);
    assert_eq!(report["skipped"], 1);

    let (status, report) = send(
        &app,
        Method::POST,
        "/api/imports/users",
        Some(&admin_token),
        Some(json!({ "csv": "Name,Mail Id\n王芳,wang@example.com\n,\n" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["accepted"], 1);
    assert_eq!(report["skipped"], 1);

    let (_, users) = send(&app, Method::GET, "/api/users", Some(&admin_token), None).await;
    let emails: Vec<&str> = users
        .as_array()
        .expect("users")
        .iter()
        .map(|user| user["email"].as_str().expect("email"))
        .collect();
    assert!(emails.contains(&"wang@example.com"));
}

#[tokio::test]
async fn attendance_tracks_sign_ins() {
    let (app, _dir) = test_app();
    let admin = signup(&app, "boss@example.com", "老板").await;
    let employee = signup(&app, "emp@example.com", "员工").await;
    let employee_id = user_id(&employee);

    let (status, logs) = send(
        &app,
        Method::GET,
        &format!("/api/attendance?userId={employee_id}"),
        Some(&token(&admin)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let logs = logs.as_array().expect("logs");
    assert!(!logs.is_empty());
    assert!(logs.iter().all(|entry| entry["userId"] == employee_id.as_str()));
    assert!(logs.iter().any(|entry| entry["kind"] == "sign_in"));
}

#[tokio::test]
async fn employees_edit_their_own_profile_but_not_roles() {
    let (app, _dir) = test_app();
    signup(&app, "boss@example.com", "老板").await;
    let employee = signup(&app, "emp@example.com", "员工").await;
    let other = signup(&app, "other@example.com", "同事").await;
    let employee_token = token(&employee);
    let employee_id = user_id(&employee);

    let (status, updated) = send(
        &app,
        Method::PUT,
        &format!("/api/users/{employee_id}"),
        Some(&employee_token),
        Some(json!({ "displayName": "新名字", "phone": "13800000000" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["displayName"], "新名字");
    assert_eq!(updated["phone"], "13800000000");

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/users/{employee_id}"),
        Some(&employee_token),
        Some(json!({ "role": "admin" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/users/{}", user_id(&other)),
        Some(&employee_token),
        Some(json!({ "displayName": "越权改名" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn user_deletion_reports_the_cascade() {
    let (app, _dir) = test_app();
    let admin = signup(&app, "boss@example.com", "老板").await;
    let employee = signup(&app, "emp@example.com", "员工").await;
    let admin_token = token(&admin);
    let employee_id = user_id(&employee);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/tasks",
        Some(&admin_token),
        Some(json!({ "title": "待删除", "assigneeId": employee_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, report) = send(
        &app,
        Method::DELETE,
        &format!("/api/users/{employee_id}"),
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["userDeleted"], true);
    assert_eq!(report["tasksDeleted"], 1);
    assert!(report["sessionsDeleted"].as_u64().expect("sessions") >= 1);
    assert_eq!(report["errors"].as_array().expect("errors").len(), 0);
}

#[tokio::test]
async fn last_admin_is_protected() {
    let (app, _dir) = test_app();
    let admin = signup(&app, "boss@example.com", "老板").await;
    let admin_token = token(&admin);
    let admin_id = user_id(&admin);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/users/{admin_id}"),
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/users/{admin_id}"),
        Some(&admin_token),
        Some(json!({ "role": "employee" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
