use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::db::repositories::activity_log_repository::ActivityLogRepository;
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::activity::{ActivityLogFilters, ActivityLogRecord};

/// Attendance and audit trail. Records are append-only; sign-in, sign-out
/// and notable mutations land here.
#[derive(Clone)]
pub struct ActivityService {
    db: DbPool,
}

impl ActivityService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub fn record(&self, user_id: &str, kind: &str, detail: Option<String>) -> AppResult<()> {
        let record = ActivityLogRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            kind: kind.to_string(),
            detail,
            created_at: Utc::now().to_rfc3339(),
        };
        self.db
            .with_connection(|conn| ActivityLogRepository::insert(conn, &record))?;
        debug!(user_id, kind, "activity recorded");
        Ok(())
    }

    pub fn list(&self, filters: ActivityLogFilters) -> AppResult<Vec<ActivityLogRecord>> {
        let rows = self
            .db
            .with_connection(|conn| ActivityLogRepository::list(conn, &filters))?;
        debug!(count = rows.len(), "activity logs listed");
        Ok(rows)
    }
}
