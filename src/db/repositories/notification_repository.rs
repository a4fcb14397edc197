use std::convert::TryFrom;

use rusqlite::{named_params, Connection, Row};

use crate::error::AppResult;
use crate::models::notification::NotificationRecord;

const BASE_SELECT: &str = r#"
    SELECT
        id,
        user_id,
        kind,
        message,
        task_id,
        days_left,
        created_at
    FROM notifications
"#;

impl TryFrom<&Row<'_>> for NotificationRecord {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(NotificationRecord {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            kind: row.get("kind")?,
            message: row.get("message")?,
            task_id: row.get("task_id")?,
            days_left: row.get("days_left")?,
            created_at: row.get("created_at")?,
        })
    }
}

pub struct NotificationRepository;

impl NotificationRepository {
    /// Identifier-keyed overwrite: refreshing reminders is idempotent and
    /// tolerates duplicate or out-of-order updates.
    pub fn upsert(conn: &Connection, record: &NotificationRecord) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT OR REPLACE INTO notifications (
                    id, user_id, kind, message, task_id, days_left, created_at
                ) VALUES (
                    :id, :user_id, :kind, :message, :task_id, :days_left, :created_at
                )
            "#,
            named_params! {
                ":id": &record.id,
                ":user_id": &record.user_id,
                ":kind": &record.kind,
                ":message": &record.message,
                ":task_id": &record.task_id,
                ":days_left": &record.days_left,
                ":created_at": &record.created_at,
            },
        )?;
        Ok(())
    }

    pub fn list_by_user(conn: &Connection, user_id: &str) -> AppResult<Vec<NotificationRecord>> {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE user_id = ?1 ORDER BY created_at DESC",
            BASE_SELECT
        ))?;
        let rows = stmt
            .query_map([user_id], |row| NotificationRecord::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn delete_by_user(conn: &Connection, user_id: &str) -> AppResult<usize> {
        let affected = conn.execute("DELETE FROM notifications WHERE user_id = ?1", [user_id])?;
        Ok(affected)
    }

    pub fn delete_stale_due_reminders(
        conn: &Connection,
        user_id: &str,
        keep_ids: &[String],
    ) -> AppResult<usize> {
        // Small list; delete one by one to keep the SQL static.
        let mut stmt = conn.prepare(
            "SELECT id FROM notifications WHERE user_id = ?1 AND kind = 'due_soon'",
        )?;
        let existing = stmt
            .query_map([user_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut removed = 0usize;
        for id in existing {
            if !keep_ids.contains(&id) {
                removed += conn.execute("DELETE FROM notifications WHERE id = ?1", [&id])?;
            }
        }
        Ok(removed)
    }
}
