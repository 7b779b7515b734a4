use anyhow::Context;
use sqlx::SqlitePool;

use crate::auth::generate_session_token;
use crate::db::{new_id, now};
use crate::error::ApiError;

/// Concept: Sessioning. Owns the `sessions` collection, associating a
/// per-request cookie token with a user id. The unauthenticated state (no
/// token, or a token with no live record) is a valid value.
#[derive(Debug, Clone)]
pub struct Sessioning {
    pool: SqlitePool,
}

impl Sessioning {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Begin a session for `user`, returning the fresh token. NotAllowed if
    /// the presented token already maps to a live session.
    pub async fn start(&self, current_token: Option<&str>, user: &str) -> Result<String, ApiError> {
        if let Some(token) = current_token {
            if self.resolve(token).await?.is_some() {
                return Err(ApiError::NotAllowed(
                    "User is already logged in!".to_string(),
                ));
            }
        }

        let token = generate_session_token();
        let timestamp = now();

        sqlx::query(
            r"
            INSERT INTO sessions (id, token, user_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ",
        )
        .bind(new_id())
        .bind(&token)
        .bind(user)
        .bind(&timestamp)
        .bind(&timestamp)
        .execute(&self.pool)
        .await
        .context("Failed to insert session")?;

        Ok(token)
    }

    /// End the session for the presented token. NotAllowed if not logged in.
    pub async fn end(&self, token: Option<&str>) -> Result<(), ApiError> {
        let token = token.ok_or_else(Self::unauthenticated)?;

        let deleted = sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await
            .context("Failed to delete session")?;

        if deleted.rows_affected() == 0 {
            return Err(Self::unauthenticated());
        }
        Ok(())
    }

    /// The user id behind the presented token. NotAllowed if absent.
    pub async fn get_user(&self, token: Option<&str>) -> Result<String, ApiError> {
        let token = token.ok_or_else(Self::unauthenticated)?;
        self.resolve(token).await?.ok_or_else(Self::unauthenticated)
    }

    /// Assert the request carries no live session.
    pub async fn is_logged_out(&self, token: Option<&str>) -> Result<(), ApiError> {
        if let Some(token) = token {
            if self.resolve(token).await?.is_some() {
                return Err(ApiError::NotAllowed(
                    "User is already logged in!".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// End every session of a user. Cascade helper for account deletion.
    pub async fn end_user_sessions(&self, user: &str) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user)
            .execute(&self.pool)
            .await
            .context("Failed to delete user sessions")?;

        Ok(())
    }

    async fn resolve(&self, token: &str) -> Result<Option<String>, ApiError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT user_id FROM sessions WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to resolve session token")?;

        Ok(row.map(|(user,)| user))
    }

    fn unauthenticated() -> ApiError {
        ApiError::NotAllowed("Must be logged in!".to_string())
    }
}
