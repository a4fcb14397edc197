use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::repositories::task_repository::TaskRepository;
use crate::db::repositories::user_repository::{UserRepository, UserRow};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::import::{ImportReport, ImportedTaskRow, ImportedUserRow};
use crate::models::task::TaskRecord;
use crate::models::user::UserRole;
use crate::services::evaluation_service::parse_datetime;
use crate::services::task_service::VALID_PRIORITIES;
use crate::utils::crypto;

const TITLE_KEYS: &[&str] = &["title", "taskname", "task"];
const START_KEYS: &[&str] = &["startdate", "start"];
const END_KEYS: &[&str] = &["enddate", "end", "duedate"];
const PRIORITY_KEYS: &[&str] = &["priority"];
const NAME_KEYS: &[&str] = &["name", "username", "displayname", "employeename"];
const EMAIL_KEYS: &[&str] = &["mailid", "mail", "email", "emailaddress"];

#[derive(Clone)]
pub struct ImportService {
    db: DbPool,
}

impl ImportService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Bulk task creation from a CSV export. Accepted rows land in a single
    /// transaction; malformed rows are counted, not fatal.
    pub fn import_tasks(&self, csv: &str) -> AppResult<ImportReport> {
        let (rows, skipped) = extract_task_rows(csv)?;
        let now = Utc::now().to_rfc3339();

        let records: Vec<TaskRecord> = rows
            .into_iter()
            .map(|row| TaskRecord {
                id: Uuid::new_v4().to_string(),
                title: row.title,
                description: None,
                status: "in process".to_string(),
                priority: row.priority,
                assignee_id: None,
                start_date: row.start_date,
                end_date: row.end_date,
                closing_mark: None,
                actual_status: None,
                created_at: now.clone(),
                updated_at: now.clone(),
            })
            .collect();

        let mut conn = self.db.get_connection()?;
        TaskRepository::insert_batch(&mut conn, &records)?;

        let report = ImportReport {
            accepted: records.len(),
            skipped,
            created_ids: records.into_iter().map(|record| record.id).collect(),
        };
        info!(
            target: "app::import",
            accepted = report.accepted,
            skipped = report.skipped,
            "tasks imported"
        );
        Ok(report)
    }

    /// Bulk employee creation. Imported accounts get a random throwaway
    /// password; an administrator hands out real credentials afterwards.
    pub fn import_users(&self, csv: &str) -> AppResult<ImportReport> {
        let (rows, mut skipped) = extract_user_rows(csv)?;
        let now = Utc::now().to_rfc3339();
        let mut report = ImportReport::default();

        for row in rows {
            let material = crypto::hash_password(&crypto::generate_session_token());
            let record = UserRow {
                id: Uuid::new_v4().to_string(),
                email: row.email,
                display_name: row.name,
                role: UserRole::Employee.as_str().to_string(),
                department: None,
                phone: None,
                password_hash: material.hash,
                password_salt: material.salt,
                created_at: now.clone(),
                updated_at: now.clone(),
            };

            let inserted = self.db.with_connection(|conn| {
                if UserRepository::find_by_email(conn, &record.email)?.is_some() {
                    return Ok(false);
                }
                UserRepository::insert(conn, &record)?;
                Ok(true)
            })?;

            if inserted {
                report.accepted += 1;
                report.created_ids.push(record.id);
            } else {
                warn!(target: "app::import", email = %record.email, "duplicate email skipped");
                skipped += 1;
            }
        }

        report.skipped = skipped;
        info!(
            target: "app::import",
            accepted = report.accepted,
            skipped = report.skipped,
            "users imported"
        );
        Ok(report)
    }
}

pub fn extract_task_rows(csv: &str) -> AppResult<(Vec<ImportedTaskRow>, usize)> {
    let records = parse_csv(csv);
    let (headers, body) = split_headers(&records)?;

    let title_idx = find_column(&headers, TITLE_KEYS)
        .ok_or_else(|| AppError::validation("导入文件缺少标题列"))?;
    let start_idx = find_column(&headers, START_KEYS);
    let end_idx = find_column(&headers, END_KEYS);
    let priority_idx = find_column(&headers, PRIORITY_KEYS);

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for record in body {
        let title = cell(record, Some(title_idx));
        if title.is_empty() {
            skipped += 1;
            continue;
        }
        rows.push(ImportedTaskRow {
            title,
            start_date: start_idx.and_then(|idx| clean_date(cell(record, Some(idx)))),
            end_date: end_idx.and_then(|idx| clean_date(cell(record, Some(idx)))),
            priority: priority_idx
                .map(|idx| clean_priority(&cell(record, Some(idx))))
                .unwrap_or_else(|| "medium".to_string()),
        });
    }
    Ok((rows, skipped))
}

pub fn extract_user_rows(csv: &str) -> AppResult<(Vec<ImportedUserRow>, usize)> {
    let records = parse_csv(csv);
    let (headers, body) = split_headers(&records)?;

    let email_idx = find_column(&headers, EMAIL_KEYS)
        .ok_or_else(|| AppError::validation("导入文件缺少邮箱列"))?;
    let name_idx = find_column(&headers, NAME_KEYS);

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for record in body {
        let email = cell(record, Some(email_idx)).to_lowercase();
        if email.is_empty() || !email.contains('@') {
            skipped += 1;
            continue;
        }
        let name = match name_idx {
            Some(idx) => {
                let value = cell(record, Some(idx));
                if value.is_empty() {
                    default_name(&email)
                } else {
                    value
                }
            }
            None => default_name(&email),
        };
        rows.push(ImportedUserRow { name, email });
    }
    Ok((rows, skipped))
}

fn split_headers(records: &[Vec<String>]) -> AppResult<(Vec<String>, &[Vec<String>])> {
    match records.split_first() {
        Some((headers, body)) => {
            let normalized = headers.iter().map(|cell| normalize_key(cell)).collect();
            Ok((normalized, body))
        }
        None => Err(AppError::validation("导入文件为空")),
    }
}

fn find_column(headers: &[String], synonyms: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|header| synonyms.contains(&header.as_str()))
}

/// Header matching ignores case, whitespace and underscores, so
/// "Mail Id", "mail_id" and "MAILID" all resolve the same way.
fn normalize_key(raw: &str) -> String {
    raw.chars()
        .filter(|ch| !ch.is_whitespace() && *ch != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

fn cell(record: &[String], index: Option<usize>) -> String {
    index
        .and_then(|idx| record.get(idx))
        .map(|value| value.trim().to_string())
        .unwrap_or_default()
}

fn clean_date(value: String) -> Option<String> {
    if parse_datetime(Some(&value)).is_some() {
        Some(value)
    } else {
        None
    }
}

fn clean_priority(value: &str) -> String {
    let lowered = value.trim().to_lowercase();
    if VALID_PRIORITIES.contains(&lowered.as_str()) {
        lowered
    } else {
        "medium".to_string()
    }
}

fn default_name(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}

/// Minimal RFC 4180 reader: quoted fields, doubled-quote escapes, CRLF and
/// embedded newlines.
pub fn parse_csv(input: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;

    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                _ => field.push(ch),
            }
            continue;
        }

        match ch {
            '"' => in_quotes = true,
            ',' => {
                record.push(std::mem::take(&mut field));
            }
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                if record.iter().any(|cell| !cell.trim().is_empty()) {
                    records.push(std::mem::take(&mut record));
                } else {
                    record.clear();
                }
            }
            _ => field.push(ch),
        }
    }

    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        if record.iter().any(|cell| !cell.trim().is_empty()) {
            records.push(record);
        }
    }

    records
}
