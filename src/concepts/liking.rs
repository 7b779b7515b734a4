use anyhow::Context;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::{new_id, now};
use crate::error::ApiError;

/// A per-(user, item) like membership record.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Like {
    pub id: String,
    pub user_id: String,
    pub item: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Concept: Liking. Owns two collections: `user_likes` membership records and
/// the `item_likes` denormalized per-item counter, so "how many likes does
/// item X have" is a single-row read instead of a membership scan.
///
/// The counter is maintained with a plain `quantity = quantity + 1` update;
/// there is no transaction spanning the membership insert and the counter
/// bump, so the pair can be observed in an intermediate state under
/// concurrent access.
#[derive(Debug, Clone)]
pub struct Liking {
    pool: SqlitePool,
}

impl Liking {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Seed a zero counter for a newly created item. Consumers are
    /// responsible for calling this; the concept does not discover items.
    pub async fn init_item(&self, item: &str) -> Result<(), ApiError> {
        let timestamp = now();
        sqlx::query(
            r"
            INSERT INTO item_likes (id, item, quantity, created_at, updated_at)
            VALUES (?, ?, 0, ?, ?)
            ON CONFLICT(item) DO NOTHING
            ",
        )
        .bind(new_id())
        .bind(item)
        .bind(&timestamp)
        .bind(&timestamp)
        .execute(&self.pool)
        .await
        .context("Failed to init item like counter")?;

        Ok(())
    }

    /// Like an item. Idempotent: re-liking an already-liked item is a no-op
    /// that does not double-increment the counter.
    pub async fn like(&self, user: &str, item: &str) -> Result<Like, ApiError> {
        let existing: Option<Like> =
            sqlx::query_as("SELECT * FROM user_likes WHERE user_id = ? AND item = ?")
                .bind(user)
                .bind(item)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to check existing like")?;

        if let Some(like) = existing {
            return Ok(like);
        }

        let id = new_id();
        let timestamp = now();

        sqlx::query(
            r"
            INSERT INTO user_likes (id, user_id, item, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ",
        )
        .bind(&id)
        .bind(user)
        .bind(item)
        .bind(&timestamp)
        .bind(&timestamp)
        .execute(&self.pool)
        .await
        .context("Failed to insert like")?;

        // Counter row is created lazily in case init_item was never called
        // for this item.
        self.init_item(item).await?;
        sqlx::query("UPDATE item_likes SET quantity = quantity + 1, updated_at = ? WHERE item = ?")
            .bind(now())
            .bind(item)
            .execute(&self.pool)
            .await
            .context("Failed to increment like counter")?;

        let like = sqlx::query_as("SELECT * FROM user_likes WHERE id = ?")
            .bind(&id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to fetch created like")?;

        Ok(like)
    }

    /// Remove a like. Silent no-op if the user never liked the item; the
    /// counter is decremented only when a membership record existed.
    pub async fn unlike(&self, user: &str, item: &str) -> Result<(), ApiError> {
        let deleted = sqlx::query("DELETE FROM user_likes WHERE user_id = ? AND item = ?")
            .bind(user)
            .bind(item)
            .execute(&self.pool)
            .await
            .context("Failed to delete like")?;

        if deleted.rows_affected() > 0 {
            sqlx::query(
                "UPDATE item_likes SET quantity = quantity - 1, updated_at = ? WHERE item = ?",
            )
            .bind(now())
            .bind(item)
            .execute(&self.pool)
            .await
            .context("Failed to decrement like counter")?;
        }

        Ok(())
    }

    /// Read the denormalized counter. `None` if the item was never seeded.
    pub async fn get_item_like_count(&self, item: &str) -> Result<Option<i64>, ApiError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT quantity FROM item_likes WHERE item = ?")
            .bind(item)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch like count")?;

        Ok(row.map(|(quantity,)| quantity))
    }

    pub async fn get_user_likes(&self, user: &str) -> Result<Vec<Like>, ApiError> {
        let likes = sqlx::query_as("SELECT * FROM user_likes WHERE user_id = ? ORDER BY rowid DESC")
            .bind(user)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch user likes")?;

        Ok(likes)
    }

    /// Ids of every user who currently likes the item.
    pub async fn get_item_likers(&self, item: &str) -> Result<Vec<String>, ApiError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT user_id FROM user_likes WHERE item = ? ORDER BY rowid")
                .bind(item)
                .fetch_all(&self.pool)
                .await
                .context("Failed to fetch item likers")?;

        Ok(rows.into_iter().map(|(user,)| user).collect())
    }

    /// Drop all like tracking for an item. Cascade helper invoked by the
    /// routing layer when the item is deleted.
    pub async fn delete_item(&self, item: &str) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM user_likes WHERE item = ?")
            .bind(item)
            .execute(&self.pool)
            .await
            .context("Failed to delete item likes")?;

        sqlx::query("DELETE FROM item_likes WHERE item = ?")
            .bind(item)
            .execute(&self.pool)
            .await
            .context("Failed to delete item like counter")?;

        Ok(())
    }
}
