use anyhow::Context;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::{new_id, now};
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Rejected,
}

impl RequestStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Rejected => "rejected",
        }
    }
}

/// A directed friend request.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FriendRequest {
    pub id: String,
    pub from_user: String,
    pub to_user: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Concept: Friending. Owns two collections: directed `friend_requests` and
/// symmetric `friendships`. On acceptance the request is removed and a
/// friendship row (unordered pair, stored once) is established.
#[derive(Debug, Clone)]
pub struct Friending {
    pool: SqlitePool,
}

impl Friending {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Requests involving the user, in either direction.
    pub async fn get_requests(&self, user: &str) -> Result<Vec<FriendRequest>, ApiError> {
        let requests = sqlx::query_as(
            "SELECT * FROM friend_requests WHERE from_user = ? OR to_user = ? ORDER BY rowid DESC",
        )
        .bind(user)
        .bind(user)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch friend requests")?;

        Ok(requests)
    }

    pub async fn send_request(&self, from: &str, to: &str) -> Result<FriendRequest, ApiError> {
        self.can_send_request(from, to).await?;

        let id = new_id();
        let timestamp = now();

        sqlx::query(
            r"
            INSERT INTO friend_requests (id, from_user, to_user, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&id)
        .bind(from)
        .bind(to)
        .bind(RequestStatus::Pending.as_str())
        .bind(&timestamp)
        .bind(&timestamp)
        .execute(&self.pool)
        .await
        .context("Failed to insert friend request")?;

        let request = sqlx::query_as("SELECT * FROM friend_requests WHERE id = ?")
            .bind(&id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to fetch created friend request")?;

        Ok(request)
    }

    pub async fn accept_request(&self, from: &str, to: &str) -> Result<(), ApiError> {
        self.remove_pending_request(from, to).await?;
        self.add_friend(from, to).await
    }

    pub async fn reject_request(&self, from: &str, to: &str) -> Result<(), ApiError> {
        self.remove_pending_request(from, to).await?;

        let timestamp = now();
        sqlx::query(
            r"
            INSERT INTO friend_requests (id, from_user, to_user, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(new_id())
        .bind(from)
        .bind(to)
        .bind(RequestStatus::Rejected.as_str())
        .bind(&timestamp)
        .bind(&timestamp)
        .execute(&self.pool)
        .await
        .context("Failed to record rejected friend request")?;

        Ok(())
    }

    /// Withdraw a pending request. NotFound if none exists.
    pub async fn remove_request(&self, from: &str, to: &str) -> Result<(), ApiError> {
        self.remove_pending_request(from, to).await
    }

    pub async fn remove_friend(&self, user: &str, friend: &str) -> Result<(), ApiError> {
        let deleted = sqlx::query(
            r"
            DELETE FROM friendships
            WHERE (user1 = ? AND user2 = ?) OR (user1 = ? AND user2 = ?)
            ",
        )
        .bind(user)
        .bind(friend)
        .bind(friend)
        .bind(user)
        .execute(&self.pool)
        .await
        .context("Failed to delete friendship")?;

        if deleted.rows_affected() == 0 {
            return Err(ApiError::NotFound(format!(
                "Friendship between {user} and {friend} does not exist!"
            )));
        }
        Ok(())
    }

    /// Ids of the user's friends (the other party of each friendship).
    pub async fn get_friends(&self, user: &str) -> Result<Vec<String>, ApiError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT user1, user2 FROM friendships WHERE user1 = ? OR user2 = ? ORDER BY rowid",
        )
        .bind(user)
        .bind(user)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch friendships")?;

        Ok(rows
            .into_iter()
            .map(|(user1, user2)| if user1 == user { user2 } else { user1 })
            .collect())
    }

    async fn add_friend(&self, user1: &str, user2: &str) -> Result<(), ApiError> {
        let timestamp = now();
        sqlx::query(
            r"
            INSERT INTO friendships (id, user1, user2, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ",
        )
        .bind(new_id())
        .bind(user1)
        .bind(user2)
        .bind(&timestamp)
        .bind(&timestamp)
        .execute(&self.pool)
        .await
        .context("Failed to insert friendship")?;

        Ok(())
    }

    /// Delete the pending request from `from` to `to`; NotFound if absent.
    async fn remove_pending_request(&self, from: &str, to: &str) -> Result<(), ApiError> {
        let deleted = sqlx::query(
            "DELETE FROM friend_requests WHERE from_user = ? AND to_user = ? AND status = ?",
        )
        .bind(from)
        .bind(to)
        .bind(RequestStatus::Pending.as_str())
        .execute(&self.pool)
        .await
        .context("Failed to delete friend request")?;

        if deleted.rows_affected() == 0 {
            return Err(ApiError::NotFound(format!(
                "Friend request from {from} to {to} does not exist!"
            )));
        }
        Ok(())
    }

    async fn is_friends(&self, user1: &str, user2: &str) -> Result<bool, ApiError> {
        let row: Option<(String,)> = sqlx::query_as(
            r"
            SELECT id FROM friendships
            WHERE (user1 = ? AND user2 = ?) OR (user1 = ? AND user2 = ?)
            ",
        )
        .bind(user1)
        .bind(user2)
        .bind(user2)
        .bind(user1)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to check friendship")?;

        Ok(row.is_some())
    }

    async fn can_send_request(&self, from: &str, to: &str) -> Result<(), ApiError> {
        if from == to {
            return Err(ApiError::NotAllowed(
                "Cannot send a friend request to yourself!".to_string(),
            ));
        }
        if self.is_friends(from, to).await? {
            return Err(ApiError::NotAllowed(format!(
                "{from} and {to} are already friends!"
            )));
        }

        let pending: Option<(String,)> = sqlx::query_as(
            r"
            SELECT id FROM friend_requests
            WHERE status = ?
              AND ((from_user = ? AND to_user = ?) OR (from_user = ? AND to_user = ?))
            ",
        )
        .bind(RequestStatus::Pending.as_str())
        .bind(from)
        .bind(to)
        .bind(to)
        .bind(from)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to check pending friend requests")?;

        if pending.is_some() {
            return Err(ApiError::NotAllowed(format!(
                "Friend request between {from} and {to} already exists!"
            )));
        }
        Ok(())
    }
}
