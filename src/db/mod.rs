use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::AppResult;

pub mod migrations;

pub mod repositories;

const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Handle to the SQLite file backing the service. Schema bootstrap and
/// migrations run once at construction; request handlers get short-lived
/// connections that only open and configure.
#[derive(Clone, Debug)]
pub struct DbPool {
    path: PathBuf,
}

impl DbPool {
    pub fn new<P: Into<PathBuf>>(path: P) -> AppResult<Self> {
        let path = path.into();
        info!(target: "app::db", db_path = %path.display(), "opening database");
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let pool = Self { path };
        let conn = pool.get_connection()?;
        conn.execute_batch(SCHEMA_SQL)?;
        migrations::run(&conn)?;

        Ok(pool)
    }

    /// WAL keeps concurrent request connections from blocking each other.
    pub fn get_connection(&self) -> AppResult<Connection> {
        let mut conn = Connection::open(&self.path)?;
        configure_connection(&mut conn)?;
        debug!(target: "app::db", db_path = %self.path.display(), "connection opened");
        Ok(conn)
    }

    pub fn with_connection<F, T>(&self, callback: F) -> AppResult<T>
    where
        F: FnOnce(&Connection) -> AppResult<T>,
    {
        let conn = self.get_connection()?;
        callback(&conn)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn configure_connection(conn: &mut Connection) -> AppResult<()> {
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.pragma_update(None, "foreign_keys", &1)?;
    conn.pragma_update(None, "journal_mode", &"WAL")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn new_bootstraps_schema_and_migrations() {
        let dir = tempdir().expect("temp dir");
        let pool = DbPool::new(dir.path().join("app.sqlite")).expect("pool");
        let conn = pool.get_connection().expect("conn");

        let version: i32 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .expect("user_version");
        assert_eq!(version, 2);

        // kpi_scores only exists via the migration runner, not schema.sql.
        let migrated: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'kpi_scores'",
                [],
                |row| row.get(0),
            )
            .expect("table lookup");
        assert_eq!(migrated, 1);
    }

    #[test]
    fn later_connections_skip_bootstrap_but_see_the_schema() {
        let dir = tempdir().expect("temp dir");
        let pool = DbPool::new(dir.path().join("app.sqlite")).expect("pool");

        pool.with_connection(|conn| {
            conn.execute(
                "INSERT INTO activity_logs (id, user_id, kind, created_at) \
                 VALUES ('a1', 'u1', 'sign_in', '2024-01-01T00:00:00Z')",
                [],
            )?;
            Ok(())
        })
        .expect("insert");

        let count: i64 = pool
            .with_connection(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM activity_logs", [], |row| row.get(0))?)
            })
            .expect("count");
        assert_eq!(count, 1);
    }

    #[test]
    fn reopening_an_existing_file_keeps_data() {
        let dir = tempdir().expect("temp dir");
        let db_path = dir.path().join("app.sqlite");

        {
            let pool = DbPool::new(db_path.clone()).expect("pool");
            pool.with_connection(|conn| {
                conn.execute(
                    "INSERT INTO activity_logs (id, user_id, kind, created_at) \
                     VALUES ('a1', 'u1', 'sign_in', '2024-01-01T00:00:00Z')",
                    [],
                )?;
                Ok(())
            })
            .expect("insert");
        }

        let reopened = DbPool::new(db_path).expect("pool");
        let count: i64 = reopened
            .with_connection(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM activity_logs", [], |row| row.get(0))?)
            })
            .expect("count");
        assert_eq!(count, 1);
    }
}
