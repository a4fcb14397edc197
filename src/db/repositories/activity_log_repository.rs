use std::convert::TryFrom;

use rusqlite::types::Value as SqlValue;
use rusqlite::{named_params, Connection, Row};

use crate::error::AppResult;
use crate::models::activity::{ActivityLogFilters, ActivityLogRecord};

const BASE_SELECT: &str = r#"
    SELECT
        id,
        user_id,
        kind,
        detail,
        created_at
    FROM activity_logs
"#;

const DEFAULT_LIMIT: usize = 200;

impl TryFrom<&Row<'_>> for ActivityLogRecord {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(ActivityLogRecord {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            kind: row.get("kind")?,
            detail: row.get("detail")?,
            created_at: row.get("created_at")?,
        })
    }
}

pub struct ActivityLogRepository;

impl ActivityLogRepository {
    pub fn insert(conn: &Connection, record: &ActivityLogRecord) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO activity_logs (id, user_id, kind, detail, created_at)
                VALUES (:id, :user_id, :kind, :detail, :created_at)
            "#,
            named_params! {
                ":id": &record.id,
                ":user_id": &record.user_id,
                ":kind": &record.kind,
                ":detail": &record.detail,
                ":created_at": &record.created_at,
            },
        )?;
        Ok(())
    }

    pub fn list(
        conn: &Connection,
        filters: &ActivityLogFilters,
    ) -> AppResult<Vec<ActivityLogRecord>> {
        let mut sql = String::from(BASE_SELECT);
        let mut clauses: Vec<&str> = Vec::new();
        let mut params: Vec<SqlValue> = Vec::new();

        if let Some(user_id) = filters.user_id.as_ref() {
            clauses.push("user_id = ?");
            params.push(SqlValue::Text(user_id.clone()));
        }
        if let Some(after) = filters.after.as_ref() {
            clauses.push("created_at >= ?");
            params.push(SqlValue::Text(after.clone()));
        }
        if let Some(before) = filters.before.as_ref() {
            clauses.push("created_at <= ?");
            params.push(SqlValue::Text(before.clone()));
        }

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        sql.push_str(" ORDER BY created_at DESC LIMIT ?");
        let limit = filters.limit.unwrap_or(DEFAULT_LIMIT).max(1);
        params.push(SqlValue::Integer(limit as i64));

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(params), |row| {
                ActivityLogRecord::try_from(row)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
