use chrono::Utc;
use tracing::{debug, info};

use crate::db::repositories::task_repository::TaskRepository;
use crate::db::repositories::user_repository::UserRepository;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::task::{TaskCreateInput, TaskRecord, TaskUpdateInput};
use crate::services::evaluation_service::parse_datetime;

pub const VALID_PRIORITIES: &[&str] = &["low", "medium", "high"];

const MAX_CLOSING_MARK: i64 = 100;

#[derive(Clone)]
pub struct TaskService {
    db: DbPool,
}

impl TaskService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub fn create_task(&self, input: TaskCreateInput) -> AppResult<TaskRecord> {
        let mut record = build_record_from_create(input)?;
        let now = Utc::now().to_rfc3339();
        record.id = uuid::Uuid::new_v4().to_string();
        record.created_at = now.clone();
        record.updated_at = now;

        validate_record(&record)?;
        self.ensure_assignee_exists(record.assignee_id.as_deref())?;

        self.db
            .with_connection(|conn| TaskRepository::insert(conn, &record))?;
        info!(task_id = %record.id, "task created");
        Ok(record)
    }

    pub fn update_task(&self, id: &str, update: TaskUpdateInput) -> AppResult<TaskRecord> {
        let mut existing = self.get_task(id)?;
        apply_update(&mut existing, update)?;
        existing.updated_at = Utc::now().to_rfc3339();
        validate_record(&existing)?;
        self.ensure_assignee_exists(existing.assignee_id.as_deref())?;

        self.db
            .with_connection(|conn| TaskRepository::update(conn, &existing))?;
        info!(task_id = %existing.id, "task updated");
        Ok(existing)
    }

    /// Admin-entered closing mark, 0-100.
    pub fn set_closing_mark(&self, id: &str, mark: i64) -> AppResult<TaskRecord> {
        if !(0..=MAX_CLOSING_MARK).contains(&mark) {
            return Err(AppError::validation("结项评分需在 0 到 100 之间"));
        }
        let mut existing = self.get_task(id)?;
        existing.closing_mark = Some(mark);
        existing.updated_at = Utc::now().to_rfc3339();

        self.db
            .with_connection(|conn| TaskRepository::update(conn, &existing))?;
        info!(task_id = %existing.id, mark, "closing mark recorded");
        Ok(existing)
    }

    pub fn delete_task(&self, id: &str) -> AppResult<()> {
        self.db
            .with_connection(|conn| TaskRepository::delete(conn, id))?;
        info!(task_id = %id, "task deleted");
        Ok(())
    }

    pub fn get_task(&self, id: &str) -> AppResult<TaskRecord> {
        let record = self
            .db
            .with_connection(|conn| TaskRepository::find_by_id(conn, id))?
            .ok_or_else(AppError::not_found)?;
        debug!(task_id = %record.id, "task fetched");
        Ok(record)
    }

    pub fn list_tasks(&self) -> AppResult<Vec<TaskRecord>> {
        let tasks = self
            .db
            .with_connection(|conn| TaskRepository::list_all(conn))?;
        debug!(count = tasks.len(), "tasks listed");
        Ok(tasks)
    }

    pub fn list_tasks_for(&self, assignee_id: &str) -> AppResult<Vec<TaskRecord>> {
        let tasks = self
            .db
            .with_connection(|conn| TaskRepository::list_by_assignee(conn, assignee_id))?;
        debug!(assignee_id, count = tasks.len(), "assignee tasks listed");
        Ok(tasks)
    }

    fn ensure_assignee_exists(&self, assignee_id: Option<&str>) -> AppResult<()> {
        if let Some(assignee_id) = assignee_id {
            let exists = self
                .db
                .with_connection(|conn| UserRepository::find_by_id(conn, assignee_id))?
                .is_some();
            if !exists {
                return Err(AppError::validation("指定的负责人不存在"));
            }
        }
        Ok(())
    }
}

fn build_record_from_create(mut input: TaskCreateInput) -> AppResult<TaskRecord> {
    let title = normalize_title(&input.title)?;
    let description = normalize_optional_string(input.description.take());
    let status = normalize_status(input.status.take());
    let priority = normalize_priority(input.priority.take())?;
    let assignee_id = normalize_optional_string(input.assignee_id.take());
    let start_date = normalize_date_opt(input.start_date.take())?;
    let end_date = normalize_date_opt(input.end_date.take())?;

    Ok(TaskRecord {
        id: String::new(),
        title,
        description,
        status,
        priority,
        assignee_id,
        start_date,
        end_date,
        closing_mark: None,
        actual_status: None,
        created_at: String::new(),
        updated_at: String::new(),
    })
}

fn apply_update(record: &mut TaskRecord, update: TaskUpdateInput) -> AppResult<()> {
    if let Some(title) = update.title {
        record.title = normalize_title(&title)?;
    }

    if let Some(description) = update.description {
        record.description = normalize_optional_string(description);
    }

    if let Some(status) = update.status {
        record.status = normalize_status(Some(status));
    }

    if let Some(priority) = update.priority {
        record.priority = normalize_priority(Some(priority))?;
    }

    if let Some(assignee_id) = update.assignee_id {
        record.assignee_id = normalize_optional_string(assignee_id);
    }

    if let Some(start_date) = update.start_date {
        record.start_date = normalize_date_opt(start_date)?;
    }

    if let Some(end_date) = update.end_date {
        record.end_date = normalize_date_opt(end_date)?;
    }

    if let Some(actual_status) = update.actual_status {
        record.actual_status = normalize_optional_string(actual_status);
    }

    Ok(())
}

fn validate_record(record: &TaskRecord) -> AppResult<()> {
    if let (Some(start), Some(end)) = (record.start_date.as_deref(), record.end_date.as_deref()) {
        let start_dt =
            parse_datetime(Some(start)).ok_or_else(|| AppError::validation("开始时间格式非法"))?;
        let end_dt =
            parse_datetime(Some(end)).ok_or_else(|| AppError::validation("截止时间格式非法"))?;
        if end_dt < start_dt {
            return Err(AppError::validation("截止时间不能早于开始时间"));
        }
    }

    Ok(())
}

fn normalize_title(title: &str) -> AppResult<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("标题不能为空"));
    }
    if trimmed.chars().count() > 160 {
        return Err(AppError::validation("标题长度需在 160 字以内"));
    }
    Ok(trimmed.to_string())
}

/// Status stays free text; canonicalization happens on read. Only trims and
/// defaults the empty case.
fn normalize_status(status: Option<String>) -> String {
    let value = status.unwrap_or_default().trim().to_string();
    if value.is_empty() {
        "in process".to_string()
    } else {
        value
    }
}

fn normalize_priority(priority: Option<String>) -> AppResult<String> {
    let value = priority
        .unwrap_or_else(|| "medium".to_string())
        .to_lowercase();
    if VALID_PRIORITIES.contains(&value.as_str()) {
        Ok(value)
    } else {
        Err(AppError::validation("优先级取值非法"))
    }
}

fn normalize_optional_string(value: Option<String>) -> Option<String> {
    value.and_then(|val| {
        let trimmed = val.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}

fn normalize_date_opt(value: Option<String>) -> AppResult<Option<String>> {
    if let Some(value) = value {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        if parse_datetime(Some(trimmed)).is_none() {
            return Err(AppError::validation("时间格式非法"));
        }
        Ok(Some(trimmed.to_string()))
    } else {
        Ok(None)
    }
}
