use serde::{Deserialize, Serialize};

/// Canonical task states. Raw status strings are free text and always pass
/// through `canonicalize_status` before evaluation or display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Completed,
    InProcess,
    Delayed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Completed => "completed",
            TaskStatus::InProcess => "in process",
            TaskStatus::Delayed => "delayed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

/// Maps an arbitrary raw status string onto one of the four canonical states.
/// Total: empty, mixed-case, `_`/`-` separated and unrecognized values all
/// resolve, with `in process` as the fallback.
pub fn canonicalize_status(raw: &str) -> TaskStatus {
    let value = raw.to_lowercase().replace(['_', '-'], " ");
    if value.contains("complete") {
        TaskStatus::Completed
    } else if value.contains("cancel") {
        TaskStatus::Cancelled
    } else if value.contains("delay") {
        TaskStatus::Delayed
    } else {
        TaskStatus::InProcess
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: String,
    pub assignee_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub closing_mark: Option<i64>,
    pub actual_status: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TaskRecord {
    pub fn canonical_status(&self) -> TaskStatus {
        canonicalize_status(&self.status)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreateInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub assignee_id: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdateInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub assignee_id: Option<Option<String>>,
    #[serde(default)]
    pub start_date: Option<Option<String>>,
    #[serde(default)]
    pub end_date: Option<Option<String>>,
    #[serde(default)]
    pub actual_status: Option<Option<String>>,
}
