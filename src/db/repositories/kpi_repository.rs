use std::convert::TryFrom;

use rusqlite::{named_params, Connection, Row};

use crate::error::AppResult;
use crate::models::kpi::KpiScoreRecord;

const BASE_SELECT: &str = r#"
    SELECT
        id,
        user_id,
        year,
        month,
        score,
        recorded_by,
        created_at
    FROM kpi_scores
"#;

impl TryFrom<&Row<'_>> for KpiScoreRecord {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(KpiScoreRecord {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            year: row.get("year")?,
            month: row.get("month")?,
            score: row.get("score")?,
            recorded_by: row.get("recorded_by")?,
            created_at: row.get("created_at")?,
        })
    }
}

pub struct KpiRepository;

impl KpiRepository {
    /// Atomic create-if-absent on the `(user_id, year, month)` key. Returns
    /// `false` when a score already exists for that key.
    pub fn insert_if_absent(conn: &Connection, record: &KpiScoreRecord) -> AppResult<bool> {
        let affected = conn.execute(
            r#"
                INSERT INTO kpi_scores (
                    id, user_id, year, month, score, recorded_by, created_at
                ) VALUES (
                    :id, :user_id, :year, :month, :score, :recorded_by, :created_at
                )
                ON CONFLICT(user_id, year, month) DO NOTHING
            "#,
            named_params! {
                ":id": &record.id,
                ":user_id": &record.user_id,
                ":year": &record.year,
                ":month": &record.month,
                ":score": &record.score,
                ":recorded_by": &record.recorded_by,
                ":created_at": &record.created_at,
            },
        )?;
        Ok(affected > 0)
    }

    pub fn list_by_user(conn: &Connection, user_id: &str) -> AppResult<Vec<KpiScoreRecord>> {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE user_id = ?1 ORDER BY year DESC, created_at DESC",
            BASE_SELECT
        ))?;
        let rows = stmt
            .query_map([user_id], |row| KpiScoreRecord::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn delete_by_user(conn: &Connection, user_id: &str) -> AppResult<usize> {
        let affected = conn.execute("DELETE FROM kpi_scores WHERE user_id = ?1", [user_id])?;
        Ok(affected)
    }
}
