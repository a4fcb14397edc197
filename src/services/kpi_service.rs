use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::repositories::kpi_repository::KpiRepository;
use crate::db::repositories::user_repository::UserRepository;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::kpi::{KpiScoreInput, KpiScoreRecord, KpiSummary};

const MONTH_NAMES: &[&str] = &[
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

#[derive(Clone)]
pub struct KpiService {
    db: DbPool,
}

impl KpiService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Records a monthly score. The `(user, year, month)` key is written
    /// atomically; a concurrent duplicate loses and gets the conflict error.
    pub fn record_score(&self, input: KpiScoreInput, recorded_by: &str) -> AppResult<KpiScoreRecord> {
        let month = canonical_month(&input.month)?;
        validate_year(input.year)?;
        validate_score(input.score)?;

        let record = KpiScoreRecord {
            id: Uuid::new_v4().to_string(),
            user_id: input.user_id.clone(),
            year: input.year,
            month: month.to_string(),
            score: input.score,
            recorded_by: recorded_by.to_string(),
            created_at: Utc::now().to_rfc3339(),
        };

        let inserted = self.db.with_connection(|conn| {
            if UserRepository::find_by_id(conn, &record.user_id)?.is_none() {
                return Err(AppError::not_found());
            }
            KpiRepository::insert_if_absent(conn, &record)
        })?;

        if !inserted {
            return Err(AppError::conflict(format!(
                "{} 年 {} 月的考核分数已存在，不能重复录入",
                record.year, record.month
            )));
        }

        info!(
            target: "app::kpi",
            user_id = %record.user_id,
            year = record.year,
            month = %record.month,
            "kpi score recorded"
        );
        Ok(record)
    }

    /// All scores for one employee plus the rounded average. No scores means
    /// an average of zero.
    pub fn summary(&self, user_id: &str) -> AppResult<KpiSummary> {
        let scores = self.db.with_connection(|conn| {
            if UserRepository::find_by_id(conn, user_id)?.is_none() {
                return Err(AppError::not_found());
            }
            KpiRepository::list_by_user(conn, user_id)
        })?;

        let average_score = average(&scores);
        debug!(target: "app::kpi", user_id, count = scores.len(), average_score, "kpi summary built");
        Ok(KpiSummary {
            user_id: user_id.to_string(),
            average_score,
            scores,
        })
    }
}

fn average(scores: &[KpiScoreRecord]) -> i64 {
    if scores.is_empty() {
        return 0;
    }
    let sum: f64 = scores.iter().map(|record| record.score).sum();
    (sum / scores.len() as f64).round() as i64
}

fn canonical_month(raw: &str) -> AppResult<&'static str> {
    let wanted = raw.trim().to_lowercase();
    MONTH_NAMES
        .iter()
        .find(|name| name.to_lowercase() == wanted)
        .copied()
        .ok_or_else(|| AppError::validation("月份名称非法"))
}

fn validate_year(year: i64) -> AppResult<()> {
    if !(2000..=2100).contains(&year) {
        return Err(AppError::validation("年份取值非法"));
    }
    Ok(())
}

fn validate_score(score: f64) -> AppResult<()> {
    if !score.is_finite() || score < 0.0 {
        return Err(AppError::validation("考核分数不能为负"));
    }
    Ok(())
}
