use chrono::Utc;
use tracing::{debug, info};

use crate::db::repositories::notification_repository::NotificationRepository;
use crate::db::repositories::task_repository::TaskRepository;
use crate::db::repositories::user_repository::UserRepository;
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::notification::NotificationRecord;
use crate::services::evaluation_service::{due_soon, DueReminder};

pub const DUE_SOON_KIND: &str = "due_soon";

#[derive(Clone)]
pub struct NotificationService {
    db: DbPool,
}

impl NotificationService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Recomputes due-soon reminders for every user. Reminder ids are derived
    /// from the task id, so re-running overwrites instead of duplicating, and
    /// reminders whose task left the window are dropped.
    pub fn refresh_due_reminders(&self) -> AppResult<usize> {
        let (users, tasks) = self.db.with_connection(|conn| {
            let users = UserRepository::list_all(conn)?;
            let tasks = TaskRepository::list_all(conn)?;
            Ok((users, tasks))
        })?;

        let today = Utc::now().date_naive();
        let now = Utc::now().to_rfc3339();
        let mut written = 0usize;

        for user in &users {
            let assigned: Vec<_> = tasks
                .iter()
                .filter(|task| task.assignee_id.as_deref() == Some(user.id.as_str()))
                .cloned()
                .collect();
            let reminders = due_soon(&assigned, today);

            let mut keep_ids = Vec::with_capacity(reminders.len());
            self.db.with_connection(|conn| {
                for reminder in &reminders {
                    let record = build_reminder(&user.id, reminder, &now);
                    keep_ids.push(record.id.clone());
                    NotificationRepository::upsert(conn, &record)?;
                }
                NotificationRepository::delete_stale_due_reminders(conn, &user.id, &keep_ids)?;
                Ok(())
            })?;
            written += keep_ids.len();
        }

        info!(target: "app::notifications", written, "due reminders refreshed");
        Ok(written)
    }

    pub fn list_for(&self, user_id: &str) -> AppResult<Vec<NotificationRecord>> {
        let rows = self
            .db
            .with_connection(|conn| NotificationRepository::list_by_user(conn, user_id))?;
        debug!(target: "app::notifications", user_id, count = rows.len(), "notifications listed");
        Ok(rows)
    }
}

fn build_reminder(user_id: &str, reminder: &DueReminder, now: &str) -> NotificationRecord {
    let message = if reminder.days_left == 0 {
        format!("任务「{}」今天到期", reminder.task.title)
    } else {
        format!(
            "任务「{}」还有 {} 天到期",
            reminder.task.title, reminder.days_left
        )
    };
    NotificationRecord {
        id: format!("due-{}", reminder.task.id),
        user_id: user_id.to_string(),
        kind: DUE_SOON_KIND.to_string(),
        message,
        task_id: Some(reminder.task.id.clone()),
        days_left: Some(reminder.days_left),
        created_at: now.to_string(),
    }
}
