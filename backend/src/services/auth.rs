//! Authentication service: credential checks and password hashing

use bcrypt::{hash, verify};
use shared::{validate_login, validate_password, User};
use sqlx::SqlitePool;
use std::sync::OnceLock;

use crate::config::AuthConfig;
use crate::error::{AppError, AppResult};
use crate::services::access::Session;
use crate::services::ensure;
use crate::services::user::UserRow;

/// Hash verified against when the login does not exist, so both failure
/// paths pay for one bcrypt verification.
static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    db: SqlitePool,
    bcrypt_cost: u32,
}

/// Hash a password with bcrypt and a random salt
pub fn hash_password(password: &str, cost: u32) -> AppResult<String> {
    hash(password, cost).map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

impl AuthService {
    /// Create a new AuthService instance
    pub fn new(db: SqlitePool, config: &AuthConfig) -> Self {
        Self {
            db,
            bcrypt_cost: config.bcrypt_cost,
        }
    }

    /// Check a login and password.
    ///
    /// An unknown login and a wrong password produce the same
    /// `InvalidCredentials` error.
    pub async fn authenticate(&self, login: &str, password: &str) -> AppResult<User> {
        ensure(
            "login",
            validate_login(login),
            "Логин должен содержать не менее 3 символов",
        )?;
        ensure(
            "password",
            validate_password(password),
            "Пароль должен содержать не менее 6 символов",
        )?;

        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, login, password_hash, role FROM users WHERE login = ?",
        )
        .bind(login)
        .fetch_optional(&self.db)
        .await?;

        let Some(row) = row else {
            self.burn_dummy_verification(password);
            tracing::warn!(login = %login, "authentication failed");
            return Err(AppError::InvalidCredentials);
        };

        let valid = verify(password, &row.password_hash).unwrap_or(false);
        if !valid {
            tracing::warn!(login = %login, "authentication failed");
            return Err(AppError::InvalidCredentials);
        }

        let user = row.into_user()?;
        tracing::info!(login = %user.login, role = %user.role, "user authenticated");
        Ok(user)
    }

    /// Authenticate and open a session for the user
    pub async fn login(&self, login: &str, password: &str) -> AppResult<Session> {
        self.authenticate(login, password).await.map(Session::new)
    }

    fn burn_dummy_verification(&self, password: &str) {
        let cost = self.bcrypt_cost;
        let dummy = DUMMY_HASH.get_or_init(|| hash("meadery-dummy-password", cost).ok());
        if let Some(dummy) = dummy {
            let _ = verify(password, dummy);
        }
    }
}
