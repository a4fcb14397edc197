use std::convert::TryFrom;

use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::error::{AppError, AppResult};
use crate::models::user::{UserRecord, UserRole};

const BASE_SELECT: &str = r#"
    SELECT
        id,
        email,
        display_name,
        role,
        department,
        phone,
        password_hash,
        password_salt,
        created_at,
        updated_at
    FROM users
"#;

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub role: String,
    pub department: Option<String>,
    pub phone: Option<String>,
    pub password_hash: String,
    pub password_salt: String,
    pub created_at: String,
    pub updated_at: String,
}

impl UserRow {
    pub fn into_record(self) -> AppResult<UserRecord> {
        let role = UserRole::parse(&self.role)
            .ok_or_else(|| AppError::database(format!("用户角色取值非法: {}", self.role)))?;
        Ok(UserRecord {
            id: self.id,
            email: self.email,
            display_name: self.display_name,
            role,
            department: self.department,
            phone: self.phone,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl TryFrom<&Row<'_>> for UserRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(UserRow {
            id: row.get("id")?,
            email: row.get("email")?,
            display_name: row.get("display_name")?,
            role: row.get("role")?,
            department: row.get("department")?,
            phone: row.get("phone")?,
            password_hash: row.get("password_hash")?,
            password_salt: row.get("password_salt")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

pub struct UserRepository;

impl UserRepository {
    pub fn insert(conn: &Connection, row: &UserRow) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO users (
                    id,
                    email,
                    display_name,
                    role,
                    department,
                    phone,
                    password_hash,
                    password_salt,
                    created_at,
                    updated_at
                ) VALUES (
                    :id,
                    :email,
                    :display_name,
                    :role,
                    :department,
                    :phone,
                    :password_hash,
                    :password_salt,
                    :created_at,
                    :updated_at
                )
            "#,
            named_params! {
                ":id": &row.id,
                ":email": &row.email,
                ":display_name": &row.display_name,
                ":role": &row.role,
                ":department": &row.department,
                ":phone": &row.phone,
                ":password_hash": &row.password_hash,
                ":password_salt": &row.password_salt,
                ":created_at": &row.created_at,
                ":updated_at": &row.updated_at,
            },
        )?;

        Ok(())
    }

    pub fn update(conn: &Connection, row: &UserRow) -> AppResult<()> {
        let affected = conn.execute(
            r#"
                UPDATE users SET
                    email = :email,
                    display_name = :display_name,
                    role = :role,
                    department = :department,
                    phone = :phone,
                    password_hash = :password_hash,
                    password_salt = :password_salt,
                    updated_at = :updated_at
                WHERE id = :id
            "#,
            named_params! {
                ":id": &row.id,
                ":email": &row.email,
                ":display_name": &row.display_name,
                ":role": &row.role,
                ":department": &row.department,
                ":phone": &row.phone,
                ":password_hash": &row.password_hash,
                ":password_salt": &row.password_salt,
                ":updated_at": &row.updated_at,
            },
        )?;

        if affected == 0 {
            return Err(AppError::not_found());
        }

        Ok(())
    }

    pub fn delete(conn: &Connection, id: &str) -> AppResult<()> {
        let affected = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
        if affected == 0 {
            return Err(AppError::not_found());
        }
        Ok(())
    }

    pub fn find_by_id(conn: &Connection, id: &str) -> AppResult<Option<UserRow>> {
        let mut stmt = conn.prepare(&format!("{} WHERE id = ?1", BASE_SELECT))?;
        let row = stmt
            .query_row([id], |row| UserRow::try_from(row))
            .optional()?;
        Ok(row)
    }

    pub fn find_by_email(conn: &Connection, email: &str) -> AppResult<Option<UserRow>> {
        let mut stmt = conn.prepare(&format!("{} WHERE email = ?1", BASE_SELECT))?;
        let row = stmt
            .query_row([email], |row| UserRow::try_from(row))
            .optional()?;
        Ok(row)
    }

    pub fn list_all(conn: &Connection) -> AppResult<Vec<UserRow>> {
        let mut stmt = conn.prepare(&format!("{} ORDER BY created_at ASC", BASE_SELECT))?;
        let rows = stmt
            .query_map([], |row| UserRow::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn count_admins(conn: &Connection) -> AppResult<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE role = 'admin'",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
