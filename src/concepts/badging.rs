use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::db::{new_id, now};
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeType {
    Shame,
    Verified,
}

impl BadgeType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Shame => "shame",
            Self::Verified => "verified",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "shame" => Some(Self::Shame),
            "verified" => Some(Self::Verified),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Badge {
    pub id: String,
    pub author: String,
    pub badge_type: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Concept: Badging. Owns the `badges` collection.
#[derive(Debug, Clone)]
pub struct Badging {
    pool: SqlitePool,
}

impl Badging {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Grant a badge. Idempotent: if the author already holds a badge of
    /// this type, the existing record is returned and no duplicate is made.
    pub async fn give(&self, author: &str, badge_type: BadgeType) -> Result<Badge, ApiError> {
        let existing: Option<Badge> =
            sqlx::query_as("SELECT * FROM badges WHERE author = ? AND badge_type = ?")
                .bind(author)
                .bind(badge_type.as_str())
                .fetch_optional(&self.pool)
                .await
                .context("Failed to check existing badge")?;

        if let Some(badge) = existing {
            return Ok(badge);
        }

        let id = new_id();
        let timestamp = now();

        sqlx::query(
            r"
            INSERT INTO badges (id, author, badge_type, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ",
        )
        .bind(&id)
        .bind(author)
        .bind(badge_type.as_str())
        .bind(&timestamp)
        .bind(&timestamp)
        .execute(&self.pool)
        .await
        .context("Failed to insert badge")?;

        let badge = sqlx::query_as("SELECT * FROM badges WHERE id = ?")
            .bind(&id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to fetch created badge")?;

        Ok(badge)
    }

    pub async fn get_badge(&self, id: &str) -> Result<Option<Badge>, ApiError> {
        let badge = sqlx::query_as("SELECT * FROM badges WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch badge")?;

        Ok(badge)
    }

    pub async fn get_by_author(&self, author: &str) -> Result<Vec<Badge>, ApiError> {
        let badges = sqlx::query_as("SELECT * FROM badges WHERE author = ? ORDER BY rowid")
            .bind(author)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch badges by author")?;

        Ok(badges)
    }

    pub async fn remove(&self, id: &str) -> Result<(), ApiError> {
        let badge = self.get_badge(id).await?;
        if badge.is_none() {
            return Err(ApiError::NotFound(format!("Badge {id} does not exist!")));
        }

        sqlx::query("DELETE FROM badges WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete badge")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_badge_type_roundtrip() {
        assert_eq!(BadgeType::parse("shame"), Some(BadgeType::Shame));
        assert_eq!(BadgeType::parse("verified"), Some(BadgeType::Verified));
        assert_eq!(BadgeType::parse("golden"), None);
        assert_eq!(BadgeType::Shame.as_str(), "shame");
    }
}
