use chrono::{DateTime, Months, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use tracing::debug;

use crate::db::repositories::task_repository::TaskRepository;
use crate::db::repositories::user_repository::UserRepository;
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::task::{TaskRecord, TaskStatus};
use crate::models::user::UserRole;

/// Fixed remark attached to failing grades.
pub const FAILING_REMARK: &str = "绩效不达标，需要重点关注";

/// How many days ahead a task counts as "due soon".
const DUE_SOON_WINDOW_DAYS: i64 = 3;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeEvaluation {
    pub user_id: String,
    pub display_name: String,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub delayed_tasks: usize,
    pub completion_rate: i64,
    pub grade: String,
    pub remark: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DueReminder {
    pub task: TaskRecord,
    pub days_left: i64,
}

/// Wraps the pure evaluation functions with data access. All computation
/// happens over in-memory snapshots fetched per call.
pub struct EvaluationService {
    db: DbPool,
}

impl EvaluationService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub fn evaluate_user(&self, user_id: &str) -> AppResult<EmployeeEvaluation> {
        let (display_name, tasks) = self.db.with_connection(|conn| {
            let user = UserRepository::find_by_id(conn, user_id)?
                .ok_or_else(crate::error::AppError::not_found)?;
            let tasks = TaskRepository::list_by_assignee(conn, user_id)?;
            Ok((user.display_name, tasks))
        })?;

        let evaluation = evaluate_tasks(user_id, &display_name, &tasks, Utc::now());
        debug!(
            target: "app::evaluation",
            user_id,
            rate = evaluation.completion_rate,
            grade = %evaluation.grade,
            "employee evaluated"
        );
        Ok(evaluation)
    }

    pub fn evaluate_all(&self) -> AppResult<Vec<EmployeeEvaluation>> {
        let (employees, tasks) = self.db.with_connection(|conn| {
            let users = UserRepository::list_all(conn)?;
            let tasks = TaskRepository::list_all(conn)?;
            Ok((users, tasks))
        })?;

        let now = Utc::now();
        let mut evaluations = Vec::new();
        for user in employees {
            if UserRole::parse(&user.role) != Some(UserRole::Employee) {
                continue;
            }
            let assigned: Vec<TaskRecord> = tasks
                .iter()
                .filter(|task| task.assignee_id.as_deref() == Some(user.id.as_str()))
                .cloned()
                .collect();
            evaluations.push(evaluate_tasks(&user.id, &user.display_name, &assigned, now));
        }
        Ok(evaluations)
    }

    pub fn due_soon(&self, assignee_id: Option<&str>) -> AppResult<Vec<DueReminder>> {
        let tasks = self.load_tasks(assignee_id)?;
        Ok(due_soon(&tasks, Utc::now().date_naive()))
    }

    pub fn delayed(&self, assignee_id: Option<&str>, months: u32) -> AppResult<Vec<TaskRecord>> {
        let tasks = self.load_tasks(assignee_id)?;
        Ok(delayed_view(&tasks, Utc::now(), months))
    }

    pub fn overdue(&self, assignee_id: Option<&str>) -> AppResult<Vec<TaskRecord>> {
        let tasks = self.load_tasks(assignee_id)?;
        Ok(overdue_view(&tasks, Utc::now()))
    }

    fn load_tasks(&self, assignee_id: Option<&str>) -> AppResult<Vec<TaskRecord>> {
        self.db.with_connection(|conn| match assignee_id {
            Some(id) => TaskRepository::list_by_assignee(conn, id),
            None => TaskRepository::list_all(conn),
        })
    }
}

/// Per-task reclassification used by the evaluation. `None` drops the task
/// from the denominator entirely (cancelled work).
fn effective_status(task: &TaskRecord, now: DateTime<Utc>) -> Option<TaskStatus> {
    match task.canonical_status() {
        TaskStatus::Cancelled => None,
        TaskStatus::Completed => Some(TaskStatus::Completed),
        TaskStatus::Delayed => Some(TaskStatus::Delayed),
        TaskStatus::InProcess => match parse_datetime(task.end_date.as_deref()) {
            Some(end) if end < now => Some(TaskStatus::Delayed),
            _ => Some(TaskStatus::Completed),
        },
    }
}

pub fn evaluate_tasks(
    user_id: &str,
    display_name: &str,
    tasks: &[TaskRecord],
    now: DateTime<Utc>,
) -> EmployeeEvaluation {
    let mut completed = 0usize;
    let mut delayed = 0usize;

    for task in tasks {
        match effective_status(task, now) {
            Some(TaskStatus::Completed) => completed += 1,
            Some(TaskStatus::Delayed) => delayed += 1,
            _ => {}
        }
    }

    let total = completed + delayed;
    let completion_rate = if total == 0 {
        0
    } else {
        ((completed as f64 / total as f64) * 100.0).round() as i64
    };

    let (grade, remark) = grade_for_rate(completion_rate);

    EmployeeEvaluation {
        user_id: user_id.to_string(),
        display_name: display_name.to_string(),
        total_tasks: total,
        completed_tasks: completed,
        delayed_tasks: delayed,
        completion_rate,
        grade: grade.to_string(),
        remark: remark.map(|value| value.to_string()),
    }
}

/// Grade bands are intentionally non-contiguous at the edges: exactly 90
/// lands in B because A requires a strictly greater rate.
pub fn grade_for_rate(rate: i64) -> (&'static str, Option<&'static str>) {
    if rate > 90 {
        ("A", None)
    } else if (85..=90).contains(&rate) {
        ("B", None)
    } else if (80..=84).contains(&rate) {
        ("C", None)
    } else if (70..=79).contains(&rate) {
        ("D", None)
    } else {
        ("F", Some(FAILING_REMARK))
    }
}

pub fn due_soon(tasks: &[TaskRecord], today: NaiveDate) -> Vec<DueReminder> {
    let mut reminders: Vec<DueReminder> = tasks
        .iter()
        .filter(|task| task.canonical_status() != TaskStatus::Completed)
        .filter_map(|task| {
            let end = parse_date(task.end_date.as_deref())?;
            let days_left = (end - today).num_days();
            if (0..=DUE_SOON_WINDOW_DAYS).contains(&days_left) {
                Some(DueReminder {
                    task: task.clone(),
                    days_left,
                })
            } else {
                None
            }
        })
        .collect();

    reminders.sort_by_key(|reminder| reminder.days_left);
    reminders
}

/// Delayed tasks, optionally restricted to those whose end date is older
/// than `now - months`. `months == 0` disables the age filter.
pub fn delayed_view(tasks: &[TaskRecord], now: DateTime<Utc>, months: u32) -> Vec<TaskRecord> {
    let cutoff = if months == 0 {
        None
    } else {
        now.checked_sub_months(Months::new(months))
    };

    let mut delayed: Vec<TaskRecord> = tasks
        .iter()
        .filter(|task| task.canonical_status() == TaskStatus::Delayed)
        .filter(|task| match (cutoff, parse_datetime(task.end_date.as_deref())) {
            (None, _) => true,
            (Some(limit), Some(end)) => end < limit,
            (Some(_), None) => false,
        })
        .cloned()
        .collect();

    sort_by_end_date_desc(&mut delayed);
    delayed
}

pub fn overdue_view(tasks: &[TaskRecord], now: DateTime<Utc>) -> Vec<TaskRecord> {
    let mut overdue: Vec<TaskRecord> = tasks
        .iter()
        .filter(|task| task.canonical_status() != TaskStatus::Completed)
        .filter(|task| match parse_datetime(task.end_date.as_deref()) {
            Some(end) => end < now,
            None => false,
        })
        .cloned()
        .collect();

    sort_by_end_date_desc(&mut overdue);
    overdue
}

fn sort_by_end_date_desc(tasks: &mut [TaskRecord]) {
    tasks.sort_by(|a, b| {
        let ts_a = parse_datetime(a.end_date.as_deref());
        let ts_b = parse_datetime(b.end_date.as_deref());
        ts_b.cmp(&ts_a)
    });
}

pub fn parse_datetime(value: Option<&str>) -> Option<DateTime<Utc>> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    Utc.from_local_datetime(&date.and_hms_opt(0, 0, 0)?).single()
}

pub fn parse_date(value: Option<&str>) -> Option<NaiveDate> {
    parse_datetime(value).map(|dt| dt.date_naive())
}
