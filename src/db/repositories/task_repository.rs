use std::convert::TryFrom;

use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::error::{AppError, AppResult};
use crate::models::task::TaskRecord;

const BASE_SELECT: &str = r#"
    SELECT
        id,
        title,
        description,
        status,
        priority,
        assignee_id,
        start_date,
        end_date,
        closing_mark,
        actual_status,
        created_at,
        updated_at
    FROM tasks
"#;

impl TryFrom<&Row<'_>> for TaskRecord {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(TaskRecord {
            id: row.get("id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            status: row.get("status")?,
            priority: row.get("priority")?,
            assignee_id: row.get("assignee_id")?,
            start_date: row.get("start_date")?,
            end_date: row.get("end_date")?,
            closing_mark: row.get("closing_mark")?,
            actual_status: row.get("actual_status")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

pub struct TaskRepository;

impl TaskRepository {
    pub fn insert(conn: &Connection, record: &TaskRecord) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO tasks (
                    id,
                    title,
                    description,
                    status,
                    priority,
                    assignee_id,
                    start_date,
                    end_date,
                    closing_mark,
                    actual_status,
                    created_at,
                    updated_at
                ) VALUES (
                    :id,
                    :title,
                    :description,
                    :status,
                    :priority,
                    :assignee_id,
                    :start_date,
                    :end_date,
                    :closing_mark,
                    :actual_status,
                    :created_at,
                    :updated_at
                )
            "#,
            named_params! {
                ":id": &record.id,
                ":title": &record.title,
                ":description": &record.description,
                ":status": &record.status,
                ":priority": &record.priority,
                ":assignee_id": &record.assignee_id,
                ":start_date": &record.start_date,
                ":end_date": &record.end_date,
                ":closing_mark": &record.closing_mark,
                ":actual_status": &record.actual_status,
                ":created_at": &record.created_at,
                ":updated_at": &record.updated_at,
            },
        )?;

        Ok(())
    }

    /// Batched insert inside a single transaction; bulk import's write path.
    pub fn insert_batch(conn: &mut Connection, records: &[TaskRecord]) -> AppResult<()> {
        let tx = conn.transaction()?;
        for record in records {
            Self::insert(&tx, record)?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn update(conn: &Connection, record: &TaskRecord) -> AppResult<()> {
        let affected = conn.execute(
            r#"
                UPDATE tasks SET
                    title = :title,
                    description = :description,
                    status = :status,
                    priority = :priority,
                    assignee_id = :assignee_id,
                    start_date = :start_date,
                    end_date = :end_date,
                    closing_mark = :closing_mark,
                    actual_status = :actual_status,
                    updated_at = :updated_at
                WHERE id = :id
            "#,
            named_params! {
                ":id": &record.id,
                ":title": &record.title,
                ":description": &record.description,
                ":status": &record.status,
                ":priority": &record.priority,
                ":assignee_id": &record.assignee_id,
                ":start_date": &record.start_date,
                ":end_date": &record.end_date,
                ":closing_mark": &record.closing_mark,
                ":actual_status": &record.actual_status,
                ":updated_at": &record.updated_at,
            },
        )?;

        if affected == 0 {
            return Err(AppError::not_found());
        }

        Ok(())
    }

    pub fn delete(conn: &Connection, id: &str) -> AppResult<()> {
        let affected = conn.execute("DELETE FROM tasks WHERE id = ?1", [id])?;
        if affected == 0 {
            return Err(AppError::not_found());
        }
        Ok(())
    }

    pub fn delete_by_assignee(conn: &Connection, assignee_id: &str) -> AppResult<usize> {
        let affected = conn.execute("DELETE FROM tasks WHERE assignee_id = ?1", [assignee_id])?;
        Ok(affected)
    }

    pub fn find_by_id(conn: &Connection, id: &str) -> AppResult<Option<TaskRecord>> {
        let mut stmt = conn.prepare(&format!("{} WHERE id = ?1", BASE_SELECT))?;
        let row = stmt
            .query_row([id], |row| TaskRecord::try_from(row))
            .optional()?;
        Ok(row)
    }

    pub fn list_all(conn: &Connection) -> AppResult<Vec<TaskRecord>> {
        let mut stmt = conn.prepare(&format!("{} ORDER BY created_at DESC", BASE_SELECT))?;
        let rows = stmt
            .query_map([], |row| TaskRecord::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn list_by_assignee(conn: &Connection, assignee_id: &str) -> AppResult<Vec<TaskRecord>> {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE assignee_id = ?1 ORDER BY created_at DESC",
            BASE_SELECT
        ))?;
        let rows = stmt
            .query_map([assignee_id], |row| TaskRecord::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
