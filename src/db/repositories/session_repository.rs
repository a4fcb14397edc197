use rusqlite::{named_params, Connection, OptionalExtension};

use crate::error::AppResult;

#[derive(Debug, Clone)]
pub struct SessionRow {
    pub token_hash: String,
    pub user_id: String,
    pub created_at: String,
    pub expires_at: String,
}

pub struct SessionRepository;

impl SessionRepository {
    pub fn insert(conn: &Connection, row: &SessionRow) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO sessions (token_hash, user_id, created_at, expires_at)
                VALUES (:token_hash, :user_id, :created_at, :expires_at)
            "#,
            named_params! {
                ":token_hash": &row.token_hash,
                ":user_id": &row.user_id,
                ":created_at": &row.created_at,
                ":expires_at": &row.expires_at,
            },
        )?;
        Ok(())
    }

    pub fn find_by_token_hash(
        conn: &Connection,
        token_hash: &str,
    ) -> AppResult<Option<SessionRow>> {
        let mut stmt = conn.prepare(
            "SELECT token_hash, user_id, created_at, expires_at FROM sessions WHERE token_hash = ?1",
        )?;
        let row = stmt
            .query_row([token_hash], |row| {
                Ok(SessionRow {
                    token_hash: row.get(0)?,
                    user_id: row.get(1)?,
                    created_at: row.get(2)?,
                    expires_at: row.get(3)?,
                })
            })
            .optional()?;
        Ok(row)
    }

    pub fn delete(conn: &Connection, token_hash: &str) -> AppResult<usize> {
        let affected = conn.execute("DELETE FROM sessions WHERE token_hash = ?1", [token_hash])?;
        Ok(affected)
    }

    pub fn delete_by_user(conn: &Connection, user_id: &str) -> AppResult<usize> {
        let affected = conn.execute("DELETE FROM sessions WHERE user_id = ?1", [user_id])?;
        Ok(affected)
    }

    pub fn purge_expired(conn: &Connection, now: &str) -> AppResult<usize> {
        let affected = conn.execute("DELETE FROM sessions WHERE expires_at < ?1", [now])?;
        Ok(affected)
    }
}
