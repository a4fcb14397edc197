use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::db::repositories::session_repository::{SessionRepository, SessionRow};
use crate::db::repositories::user_repository::UserRepository;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::user::{UserCreateInput, UserRecord, UserRole};
use crate::services::activity_service::ActivityService;
use crate::services::user_service::UserService;
use crate::utils::crypto;

const SESSION_TTL_HOURS: i64 = 24;

/// Message for every credential failure. Deliberately does not reveal
/// whether the email exists.
const BAD_CREDENTIALS: &str = "邮箱或密码不正确";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigninInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub token: String,
    pub expires_at: String,
    pub user: UserRecord,
}

#[derive(Clone)]
pub struct AuthService {
    db: DbPool,
    users: UserService,
    activity: ActivityService,
}

impl AuthService {
    pub fn new(db: DbPool, users: UserService, activity: ActivityService) -> Self {
        Self {
            db,
            users,
            activity,
        }
    }

    /// Self-service registration. The very first account bootstraps as the
    /// administrator; everyone after that signs up as an employee.
    pub fn signup(&self, mut input: UserCreateInput) -> AppResult<AuthSession> {
        let bootstrap = self.users.count_users()? == 0;
        input.role = Some(
            if bootstrap {
                UserRole::Admin
            } else {
                UserRole::Employee
            }
            .as_str()
            .to_string(),
        );

        let user = self.users.create_user(input)?;
        if bootstrap {
            info!(target: "app::auth", user_id = %user.id, "first account bootstrapped as admin");
        }
        let session = self.open_session(user)?;
        self.activity
            .record(&session.user.id, "sign_in", Some("signup".into()))?;
        Ok(session)
    }

    pub fn signin(&self, input: SigninInput) -> AppResult<AuthSession> {
        let email = input.email.trim().to_lowercase();
        let row = self
            .db
            .with_connection(|conn| UserRepository::find_by_email(conn, &email))?;

        let row = match row {
            Some(row) => row,
            None => {
                warn!(target: "app::auth", "signin rejected: unknown email");
                return Err(AppError::validation(BAD_CREDENTIALS));
            }
        };

        if !crypto::verify_password(&input.password, &row.password_hash, &row.password_salt)? {
            warn!(target: "app::auth", user_id = %row.id, "signin rejected: bad password");
            return Err(AppError::validation(BAD_CREDENTIALS));
        }

        // Opportunistic cleanup while we already hold a connection.
        let now = Utc::now().to_rfc3339();
        self.db
            .with_connection(|conn| SessionRepository::purge_expired(conn, &now))?;

        let user = row.into_record()?;
        let session = self.open_session(user)?;
        self.activity.record(&session.user.id, "sign_in", None)?;
        info!(target: "app::auth", user_id = %session.user.id, "signin succeeded");
        Ok(session)
    }

    pub fn signout(&self, token: &str) -> AppResult<()> {
        let digest = crypto::token_digest(token);
        let session = self
            .db
            .with_connection(|conn| SessionRepository::find_by_token_hash(conn, &digest))?;

        if let Some(session) = session {
            self.db
                .with_connection(|conn| SessionRepository::delete(conn, &digest))?;
            self.activity.record(&session.user_id, "sign_out", None)?;
            info!(target: "app::auth", user_id = %session.user_id, "signout succeeded");
        }
        Ok(())
    }

    /// Resolves a bearer token to its user, expiring stale sessions on the
    /// way.
    pub fn authenticate(&self, token: &str) -> AppResult<UserRecord> {
        let digest = crypto::token_digest(token);
        let session = self
            .db
            .with_connection(|conn| SessionRepository::find_by_token_hash(conn, &digest))?
            .ok_or_else(AppError::unauthorized)?;

        let now = Utc::now().to_rfc3339();
        if session.expires_at < now {
            self.db
                .with_connection(|conn| SessionRepository::delete(conn, &digest))?;
            debug!(target: "app::auth", user_id = %session.user_id, "session expired");
            return Err(AppError::unauthorized());
        }

        let row = self
            .db
            .with_connection(|conn| UserRepository::find_by_id(conn, &session.user_id))?
            .ok_or_else(AppError::unauthorized)?;
        row.into_record()
    }

    fn open_session(&self, user: UserRecord) -> AppResult<AuthSession> {
        let token = crypto::generate_session_token();
        let now = Utc::now();
        let expires_at = (now + Duration::hours(SESSION_TTL_HOURS)).to_rfc3339();
        let row = SessionRow {
            token_hash: crypto::token_digest(&token),
            user_id: user.id.clone(),
            created_at: now.to_rfc3339(),
            expires_at: expires_at.clone(),
        };
        self.db
            .with_connection(|conn| SessionRepository::insert(conn, &row))?;

        Ok(AuthSession {
            token,
            expires_at,
            user,
        })
    }
}
