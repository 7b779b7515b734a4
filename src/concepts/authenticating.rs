use std::collections::HashMap;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::auth::{hash_password, verify_password};
use crate::db::{new_id, now};
use crate::error::ApiError;

/// Username shown in place of ids whose account no longer exists.
pub const DELETED_USER: &str = "DELETED_USER";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

/// A user account. The password hash never leaves this module: read paths
/// return [`UserView`] instead.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Password-redacted projection of a user, safe for responses.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: String,
    pub username: String,
    pub role: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Concept: Authenticating. Owns the `users` collection.
#[derive(Debug, Clone)]
pub struct Authenticating {
    pool: SqlitePool,
}

impl Authenticating {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Register a regular user.
    pub async fn create(&self, username: &str, password: &str) -> Result<UserView, ApiError> {
        self.create_with_role(username, password, UserRole::User)
            .await
    }

    /// Register an admin user.
    pub async fn create_admin(&self, username: &str, password: &str) -> Result<UserView, ApiError> {
        self.create_with_role(username, password, UserRole::Admin)
            .await
    }

    async fn create_with_role(
        &self,
        username: &str,
        password: &str,
        role: UserRole,
    ) -> Result<UserView, ApiError> {
        self.assert_good_credentials(username, password).await?;

        let id = new_id();
        let timestamp = now();
        let password_hash = hash_password(password)?;

        sqlx::query(
            r"
            INSERT INTO users (id, username, password_hash, role, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&id)
        .bind(username)
        .bind(&password_hash)
        .bind(role.as_str())
        .bind(&timestamp)
        .bind(&timestamp)
        .execute(&self.pool)
        .await
        .context("Failed to insert user")?;

        self.get_user_by_id(&id).await
    }

    /// Seed the bootstrap admin if no admin exists yet. Idempotent; intended
    /// to be invoked exactly once during initialization, from `main`.
    pub async fn seed_admin(&self, username: &str, password: &str) -> Result<(), ApiError> {
        let admins = self.get_admins().await?;
        if admins.is_empty() {
            let admin = self.create_admin(username, password).await?;
            tracing::info!(username = %admin.username, "Seeded bootstrap admin");
        }
        Ok(())
    }

    /// Check a username/password pair, returning the user id on success.
    /// Never reveals which of the two fields was wrong.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<String, ApiError> {
        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user for authentication")?;

        if let Some(user) = user {
            if verify_password(password, &user.password_hash)? {
                return Ok(user.id);
            }
        }
        Err(ApiError::NotAllowed(
            "Username or password is incorrect.".to_string(),
        ))
    }

    pub async fn get_user_by_id(&self, id: &str) -> Result<UserView, ApiError> {
        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by id")?;

        user.map(UserView::from)
            .ok_or_else(|| ApiError::NotFound("User not found!".to_string()))
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<UserView, ApiError> {
        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by username")?;

        user.map(UserView::from)
            .ok_or_else(|| ApiError::NotFound("User not found!".to_string()))
    }

    /// Resolve ids to usernames, substituting [`DELETED_USER`] for ids with
    /// no matching live record. Preserves input order and length.
    pub async fn ids_to_usernames(&self, ids: &[String]) -> Result<Vec<String>, ApiError> {
        let users: Vec<User> = sqlx::query_as("SELECT * FROM users")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch users for id resolution")?;

        let by_id: HashMap<String, String> =
            users.into_iter().map(|u| (u.id, u.username)).collect();

        Ok(ids
            .iter()
            .map(|id| {
                by_id
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| DELETED_USER.to_string())
            })
            .collect())
    }

    pub async fn get_users(&self) -> Result<Vec<UserView>, ApiError> {
        let users: Vec<User> = sqlx::query_as("SELECT * FROM users ORDER BY rowid")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch users")?;

        Ok(users.into_iter().map(UserView::from).collect())
    }

    pub async fn get_admins(&self) -> Result<Vec<UserView>, ApiError> {
        let users: Vec<User> =
            sqlx::query_as("SELECT * FROM users WHERE role = 'admin' ORDER BY rowid")
                .fetch_all(&self.pool)
                .await
                .context("Failed to fetch admins")?;

        Ok(users.into_iter().map(UserView::from).collect())
    }

    /// Change a username, enforcing global uniqueness.
    pub async fn update_username(&self, id: &str, username: &str) -> Result<(), ApiError> {
        if username.is_empty() {
            return Err(ApiError::BadInput("Username must be non-empty!".to_string()));
        }
        self.assert_username_unique(username).await?;

        sqlx::query("UPDATE users SET username = ?, updated_at = ? WHERE id = ?")
            .bind(username)
            .bind(now())
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update username")?;

        Ok(())
    }

    /// Change a password after verifying the current one.
    pub async fn update_password(
        &self,
        id: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ApiError> {
        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user for password update")?;

        let user = user.ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

        if !verify_password(current_password, &user.password_hash)? {
            return Err(ApiError::NotAllowed(
                "The given current password is wrong!".to_string(),
            ));
        }
        if new_password.is_empty() {
            return Err(ApiError::BadInput("Password must be non-empty!".to_string()));
        }

        sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(hash_password(new_password)?)
            .bind(now())
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update password")?;

        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete user")?;

        Ok(())
    }

    pub async fn assert_user_is_admin(&self, id: &str) -> Result<(), ApiError> {
        let user = self.get_user_by_id(id).await?;
        if user.role != UserRole::Admin.as_str() {
            return Err(ApiError::NotAllowed(
                "User does not have admin privileges!".to_string(),
            ));
        }
        Ok(())
    }

    async fn assert_good_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(), ApiError> {
        if username.is_empty() || password.is_empty() {
            return Err(ApiError::BadInput(
                "Username and password must be non-empty!".to_string(),
            ));
        }
        self.assert_username_unique(username).await
    }

    async fn assert_username_unique(&self, username: &str) -> Result<(), ApiError> {
        let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to check username uniqueness")?;

        if existing.is_some() {
            return Err(ApiError::NotAllowed(format!(
                "User with username {username} already exists!"
            )));
        }
        Ok(())
    }
}
