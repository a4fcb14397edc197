use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::repositories::kpi_repository::KpiRepository;
use crate::db::repositories::notification_repository::NotificationRepository;
use crate::db::repositories::session_repository::SessionRepository;
use crate::db::repositories::task_repository::TaskRepository;
use crate::db::repositories::user_repository::{UserRepository, UserRow};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::user::{UserCreateInput, UserDeleteReport, UserRecord, UserRole, UserUpdateInput};
use crate::utils::crypto;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex"));

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Clone)]
pub struct UserService {
    db: DbPool,
}

impl UserService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub fn create_user(&self, input: UserCreateInput) -> AppResult<UserRecord> {
        let email = normalize_email(&input.email)?;
        let display_name = normalize_display_name(&input.display_name)?;
        validate_password(&input.password)?;
        let role = parse_role_opt(input.role.as_deref())?.unwrap_or(UserRole::Employee);

        let material = crypto::hash_password(&input.password);
        let now = Utc::now().to_rfc3339();
        let row = UserRow {
            id: Uuid::new_v4().to_string(),
            email,
            display_name,
            role: role.as_str().to_string(),
            department: trim_opt(input.department),
            phone: trim_opt(input.phone),
            password_hash: material.hash,
            password_salt: material.salt,
            created_at: now.clone(),
            updated_at: now,
        };

        self.db.with_connection(|conn| {
            if UserRepository::find_by_email(conn, &row.email)?.is_some() {
                return Err(AppError::conflict("该邮箱已被注册"));
            }
            UserRepository::insert(conn, &row)
        })?;

        info!(target: "app::auth", user_id = %row.id, "user created");
        row.into_record()
    }

    pub fn update_user(&self, id: &str, update: UserUpdateInput) -> AppResult<UserRecord> {
        let mut row = self.find_row(id)?;

        if let Some(display_name) = update.display_name {
            row.display_name = normalize_display_name(&display_name)?;
        }
        if let Some(department) = update.department {
            row.department = trim_opt(department);
        }
        if let Some(phone) = update.phone {
            row.phone = trim_opt(phone);
        }
        if let Some(role) = update.role {
            let parsed = UserRole::parse(&role)
                .ok_or_else(|| AppError::validation("用户角色取值非法"))?;
            if row.role == UserRole::Admin.as_str() && parsed == UserRole::Employee {
                self.ensure_not_last_admin()?;
            }
            row.role = parsed.as_str().to_string();
        }
        row.updated_at = Utc::now().to_rfc3339();

        self.db.with_connection(|conn| UserRepository::update(conn, &row))?;
        info!(target: "app::auth", user_id = %row.id, "user updated");
        row.into_record()
    }

    /// Cascading deletion as a sequence of independent steps. A failed step
    /// is reported, not rolled back, so partial progress survives.
    pub fn delete_user(&self, id: &str) -> AppResult<UserDeleteReport> {
        let row = self.find_row(id)?;
        if row.role == UserRole::Admin.as_str() {
            self.ensure_not_last_admin()?;
        }

        let mut report = UserDeleteReport {
            user_id: id.to_string(),
            ..Default::default()
        };

        match self
            .db
            .with_connection(|conn| SessionRepository::delete_by_user(conn, id))
        {
            Ok(count) => report.sessions_deleted = count,
            Err(err) => report.errors.push(format!("删除会话失败: {err}")),
        }

        match self
            .db
            .with_connection(|conn| TaskRepository::delete_by_assignee(conn, id))
        {
            Ok(count) => report.tasks_deleted = count,
            Err(err) => report.errors.push(format!("删除任务失败: {err}")),
        }

        match self
            .db
            .with_connection(|conn| KpiRepository::delete_by_user(conn, id))
        {
            Ok(count) => report.kpi_scores_deleted = count,
            Err(err) => report.errors.push(format!("删除考核记录失败: {err}")),
        }

        match self
            .db
            .with_connection(|conn| NotificationRepository::delete_by_user(conn, id))
        {
            Ok(count) => report.notifications_deleted = count,
            Err(err) => report.errors.push(format!("删除通知失败: {err}")),
        }

        match self.db.with_connection(|conn| UserRepository::delete(conn, id)) {
            Ok(()) => report.user_deleted = true,
            Err(err) => report.errors.push(format!("删除用户失败: {err}")),
        }

        if report.errors.is_empty() {
            info!(target: "app::auth", user_id = %id, "user deleted");
        } else {
            warn!(
                target: "app::auth",
                user_id = %id,
                errors = report.errors.len(),
                "user deletion finished with errors"
            );
        }
        Ok(report)
    }

    pub fn get_user(&self, id: &str) -> AppResult<UserRecord> {
        self.find_row(id)?.into_record()
    }

    pub fn list_users(&self) -> AppResult<Vec<UserRecord>> {
        let rows = self.db.with_connection(|conn| UserRepository::list_all(conn))?;
        rows.into_iter().map(UserRow::into_record).collect()
    }

    pub fn count_users(&self) -> AppResult<i64> {
        self.db.with_connection(|conn| {
            let count = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
            Ok(count)
        })
    }

    fn find_row(&self, id: &str) -> AppResult<UserRow> {
        self.db
            .with_connection(|conn| UserRepository::find_by_id(conn, id))?
            .ok_or_else(AppError::not_found)
    }

    fn ensure_not_last_admin(&self) -> AppResult<()> {
        let admins = self
            .db
            .with_connection(|conn| UserRepository::count_admins(conn))?;
        if admins <= 1 {
            return Err(AppError::validation("系统至少需要保留一名管理员"));
        }
        Ok(())
    }
}

fn normalize_email(email: &str) -> AppResult<String> {
    let trimmed = email.trim().to_lowercase();
    if !EMAIL_RE.is_match(&trimmed) {
        return Err(AppError::validation("邮箱格式非法"));
    }
    Ok(trimmed)
}

fn normalize_display_name(name: &str) -> AppResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("姓名不能为空"));
    }
    Ok(trimmed.to_string())
}

fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation("密码长度至少 8 位"));
    }
    Ok(())
}

fn parse_role_opt(raw: Option<&str>) -> AppResult<Option<UserRole>> {
    match raw {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => UserRole::parse(value)
            .map(Some)
            .ok_or_else(|| AppError::validation("用户角色取值非法")),
    }
}

fn trim_opt(value: Option<String>) -> Option<String> {
    value.and_then(|val| {
        let trimmed = val.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}
