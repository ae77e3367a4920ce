//! User administration service

use serde::Deserialize;
use shared::{Capability, Role, User};
use sqlx::{FromRow, SqlitePool};
use validator::Validate;

use crate::config::AuthConfig;
use crate::db::matches_search;
use crate::error::{AppError, AppResult};
use crate::services::access::Session;
use crate::services::auth::hash_password;

/// User administration service
#[derive(Clone)]
pub struct UserService {
    db: SqlitePool,
    bcrypt_cost: u32,
}

/// Input for creating a user
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserInput {
    #[validate(length(min = 3, message = "Login must be at least 3 characters"))]
    pub login: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    pub role: Role,
}

/// Input for updating a user. The password is re-hashed only when supplied.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserInput {
    #[validate(length(min = 3, message = "Login must be at least 3 characters"))]
    pub login: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: Option<String>,
    pub role: Role,
}

/// Row for user queries
#[derive(Debug, FromRow)]
pub(crate) struct UserRow {
    pub id: i64,
    pub login: String,
    pub password_hash: String,
    pub role: String,
}

impl UserRow {
    pub(crate) fn into_user(self) -> AppResult<User> {
        Ok(User {
            id: self.id,
            login: self.login,
            role: self.role.parse()?,
        })
    }
}

impl UserService {
    pub fn new(db: SqlitePool, config: &AuthConfig) -> Self {
        Self {
            db,
            bcrypt_cost: config.bcrypt_cost,
        }
    }

    /// Create the first administrator. Only allowed while no users exist.
    pub async fn bootstrap_admin(&self, login: &str, password: &str) -> AppResult<User> {
        let input = CreateUserInput {
            login: login.trim().to_string(),
            password: password.to_string(),
            role: Role::Admin,
        };
        input.validate()?;

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await?;
        if existing > 0 {
            return Err(AppError::conflict(
                "user",
                "Users already exist",
                "Пользователи уже созданы",
            ));
        }

        let user = self.insert_user(&input).await?;
        tracing::info!(login = %user.login, "administrator bootstrapped");
        Ok(user)
    }

    /// Create a user account
    pub async fn create_user(&self, session: &Session, input: CreateUserInput) -> AppResult<User> {
        session.require(Capability::ManageUsers)?;
        let input = CreateUserInput {
            login: input.login.trim().to_string(),
            ..input
        };
        input.validate()?;
        self.ensure_login_free(&input.login, None).await?;

        let user = self.insert_user(&input).await?;
        tracing::info!(login = %user.login, role = %user.role, by = %session.login(), "user created");
        Ok(user)
    }

    /// Update login, role and optionally the password of a user
    pub async fn update_user(
        &self,
        session: &Session,
        id: i64,
        input: UpdateUserInput,
    ) -> AppResult<User> {
        session.require(Capability::ManageUsers)?;
        let input = UpdateUserInput {
            login: input.login.trim().to_string(),
            ..input
        };
        input.validate()?;
        self.fetch_user(id).await?;
        self.ensure_login_free(&input.login, Some(id)).await?;

        let mut tx = self.db.begin().await?;

        sqlx::query("UPDATE users SET login = ?, role = ? WHERE id = ?")
            .bind(&input.login)
            .bind(input.role.as_str())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if let Some(password) = &input.password {
            let password_hash = hash_password(password, self.bcrypt_cost)?;
            sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
                .bind(password_hash)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::info!(user_id = id, by = %session.login(), "user updated");
        self.fetch_user(id).await
    }

    /// Delete a user that owns no batches or orders
    pub async fn delete_user(&self, session: &Session, id: i64) -> AppResult<()> {
        session.require(Capability::ManageUsers)?;
        if id == session.user_id() {
            return Err(AppError::conflict(
                "user",
                "You cannot delete your own account",
                "Нельзя удалить собственную учётную запись",
            ));
        }
        self.fetch_user(id).await?;

        let owned: i64 = sqlx::query_scalar(
            "SELECT (SELECT COUNT(*) FROM batches WHERE user_id = ?) + (SELECT COUNT(*) FROM orders WHERE user_id = ?)",
        )
        .bind(id)
        .bind(id)
        .fetch_one(&self.db)
        .await?;
        if owned > 0 {
            return Err(AppError::UserInUse);
        }

        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;

        tracing::info!(user_id = id, by = %session.login(), "user deleted");
        Ok(())
    }

    /// List users whose login contains the search text
    pub async fn list_users(&self, session: &Session, search: Option<&str>) -> AppResult<Vec<User>> {
        session.require(Capability::ManageUsers)?;
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT id, login, password_hash, role FROM users ORDER BY login",
        )
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .filter(|row| matches_search(&row.login, search))
            .map(UserRow::into_user)
            .collect()
    }

    pub async fn get_user(&self, session: &Session, id: i64) -> AppResult<User> {
        session.require(Capability::ManageUsers)?;
        self.fetch_user(id).await
    }

    async fn fetch_user(&self, id: i64) -> AppResult<User> {
        sqlx::query_as::<_, UserRow>("SELECT id, login, password_hash, role FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("User".to_string()))?
            .into_user()
    }

    async fn ensure_login_free(&self, login: &str, except_id: Option<i64>) -> AppResult<()> {
        let taken: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE login = ? AND id != ?")
            .bind(login)
            .bind(except_id.unwrap_or(0))
            .fetch_one(&self.db)
            .await?;
        if taken > 0 {
            return Err(AppError::conflict(
                "login",
                "Login is already taken",
                "Такой логин уже существует",
            ));
        }
        Ok(())
    }

    async fn insert_user(&self, input: &CreateUserInput) -> AppResult<User> {
        let password_hash = hash_password(&input.password, self.bcrypt_cost)?;
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO users (login, password_hash, role) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(&input.login)
        .bind(password_hash)
        .bind(input.role.as_str())
        .fetch_one(&self.db)
        .await?;

        Ok(User {
            id,
            login: input.login.clone(),
            role: input.role,
        })
    }
}
