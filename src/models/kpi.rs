use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KpiScoreRecord {
    pub id: String,
    pub user_id: String,
    pub year: i64,
    pub month: String,
    pub score: f64,
    pub recorded_by: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct KpiScoreInput {
    pub user_id: String,
    pub year: i64,
    pub month: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiSummary {
    pub user_id: String,
    pub average_score: i64,
    pub scores: Vec<KpiScoreRecord>,
}
