use serde::Serialize;

/// A task row extracted from an imported spreadsheet.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportedTaskRow {
    pub title: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub priority: String,
}

/// A user row extracted from an imported spreadsheet.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportedUserRow {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub accepted: usize,
    pub skipped: usize,
    pub created_ids: Vec<String>,
}
