use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
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

struct Fixture {
    app: Router,
    admin_token: String,
    employee_token: String,
    employee_id: String,
    _dir: tempfile::TempDir,
}

async fn setup() -> Fixture {
    let (app, _dir) = test_app();

    let (status, admin) = send(
        &app,
        Method::POST,
        "/api/auth/signup",
        None,
        Some(json!({
            "email": "boss@example.com",
            "displayName": "老板",
            "password": "long-enough-secret",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, employee) = send(
        &app,
        Method::POST,
        "/api/auth/signup",
        None,
        Some(json!({
            "email": "emp@example.com",
            "displayName": "员工",
            "password": "long-enough-secret",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    Fixture {
        admin_token: admin["token"].as_str().expect("token").to_string(),
        employee_token: employee["token"].as_str().expect("token").to_string(),
        employee_id: employee["user"]["id"].as_str().expect("id").to_string(),
        app,
        _dir,
    }
}

async fn create_task(fixture: &Fixture, status_text: &str, end_date: Option<String>) {
    let mut body = json!({
        "title": format!("{status_text} 任务"),
        "status": status_text,
        "assigneeId": fixture.employee_id,
    });
    if let Some(end) = end_date {
        body["endDate"] = Value::String(end);
    }
    let (status, response) = send(
        &fixture.app,
        Method::POST,
        "/api/tasks",
        Some(&fixture.admin_token),
        Some(body),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "task creation failed: {response}");
}

fn days_from_now(days: i64) -> String {
    (Utc::now().date_naive() + Duration::days(days))
        .format("%Y-%m-%d")
        .to_string()
}

#[tokio::test]
async fn evaluation_scores_and_grades_an_employee() {
    let fixture = setup().await;

    // Three completed, one explicitly delayed, one cancelled (ignored).
    for _ in 0..3 {
        create_task(&fixture, "completed", None).await;
    }
    create_task(&fixture, "delayed", Some(days_from_now(-30))).await;
    create_task(&fixture, "cancelled", None).await;

    let (status, evaluation) = send(
        &fixture.app,
        Method::GET,
        &format!("/api/evaluation/{}", fixture.employee_id),
        Some(&fixture.admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(evaluation["totalTasks"], 4);
    assert_eq!(evaluation["completedTasks"], 3);
    assert_eq!(evaluation["delayedTasks"], 1);
    assert_eq!(evaluation["completionRate"], 75);
    assert_eq!(evaluation["grade"], "D");
    assert!(evaluation["remark"].is_null());
}

#[tokio::test]
async fn failing_evaluation_carries_the_remark() {
    let fixture = setup().await;
    create_task(&fixture, "delayed", Some(days_from_now(-10))).await;

    let (status, evaluation) = send(
        &fixture.app,
        Method::GET,
        &format!("/api/evaluation/{}", fixture.employee_id),
        Some(&fixture.employee_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(evaluation["completionRate"], 0);
    assert_eq!(evaluation["grade"], "F");
    assert_eq!(evaluation["remark"], "绩效不达标，需要重点关注");
}

#[tokio::test]
async fn evaluation_overview_lists_employees_only() {
    let fixture = setup().await;
    create_task(&fixture, "completed", None).await;

    let (status, overview) = send(
        &fixture.app,
        Method::GET,
        "/api/evaluation",
        Some(&fixture.admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let overview = overview.as_array().expect("array");
    assert_eq!(overview.len(), 1);
    assert_eq!(overview[0]["userId"], fixture.employee_id.as_str());
    assert_eq!(overview[0]["grade"], "A");
}

#[tokio::test]
async fn due_soon_window_and_ordering() {
    let fixture = setup().await;
    create_task(&fixture, "in process", Some(days_from_now(3))).await;
    create_task(&fixture, "in process", Some(days_from_now(1))).await;
    create_task(&fixture, "in process", Some(days_from_now(4))).await;
    create_task(&fixture, "completed", Some(days_from_now(1))).await;

    let (status, reminders) = send(
        &fixture.app,
        Method::GET,
        "/api/reminders/due-soon",
        Some(&fixture.employee_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let reminders = reminders.as_array().expect("array");
    assert_eq!(reminders.len(), 2);
    assert_eq!(reminders[0]["daysLeft"], 1);
    assert_eq!(reminders[1]["daysLeft"], 3);
}

#[tokio::test]
async fn delayed_view_honors_months_cutoff() {
    let fixture = setup().await;
    create_task(&fixture, "delayed", Some(days_from_now(-120))).await;
    create_task(&fixture, "delayed", Some(days_from_now(-10))).await;

    let (status, all) = send(
        &fixture.app,
        Method::GET,
        "/api/reminders/delayed",
        Some(&fixture.admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().expect("array").len(), 2);

    let (status, aged) = send(
        &fixture.app,
        Method::GET,
        "/api/reminders/delayed?months=3",
        Some(&fixture.admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(aged.as_array().expect("array").len(), 1);
}

#[tokio::test]
async fn overdue_requires_strictly_past_deadlines() {
    let fixture = setup().await;
    create_task(&fixture, "in process", Some(days_from_now(-2))).await;
    create_task(&fixture, "in process", Some(days_from_now(2))).await;
    create_task(&fixture, "completed", Some(days_from_now(-2))).await;

    let (status, overdue) = send(
        &fixture.app,
        Method::GET,
        "/api/reminders/overdue",
        Some(&fixture.employee_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(overdue.as_array().expect("array").len(), 1);
}

#[tokio::test]
async fn notification_refresh_is_idempotent() {
    let fixture = setup().await;
    create_task(&fixture, "in process", Some(days_from_now(1))).await;
    create_task(&fixture, "in process", Some(days_from_now(2))).await;
    create_task(&fixture, "in process", Some(days_from_now(30))).await;

    for _ in 0..2 {
        let (status, body) = send(
            &fixture.app,
            Method::POST,
            "/api/notifications/refresh",
            Some(&fixture.admin_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["written"], 2);
    }

    let (status, notifications) = send(
        &fixture.app,
        Method::GET,
        "/api/notifications",
        Some(&fixture.employee_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let notifications = notifications.as_array().expect("array");
    assert_eq!(notifications.len(), 2);
    assert!(notifications
        .iter()
        .all(|entry| entry["kind"] == "due_soon"));
    assert!(notifications
        .iter()
        .all(|entry| entry["message"].as_str().expect("message").contains("到期")));
}
