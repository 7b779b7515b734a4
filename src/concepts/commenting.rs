use anyhow::Context;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::{new_id, now};
use crate::error::ApiError;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Comment {
    pub id: String,
    pub author: String,
    pub item: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Concept: Commenting. Owns the `comments` collection. The `item` field is
/// an untyped reference to an entity owned by some other concept.
#[derive(Debug, Clone)]
pub struct Commenting {
    pool: SqlitePool,
}

impl Commenting {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        author: &str,
        item: &str,
        content: &str,
    ) -> Result<Comment, ApiError> {
        let id = new_id();
        let timestamp = now();

        sqlx::query(
            r"
            INSERT INTO comments (id, author, item, content, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&id)
        .bind(author)
        .bind(item)
        .bind(content)
        .bind(&timestamp)
        .bind(&timestamp)
        .execute(&self.pool)
        .await
        .context("Failed to insert comment")?;

        let comment = self.get_comment(&id).await?;
        comment.ok_or_else(|| ApiError::NotFound("Comment not found!".to_string()))
    }

    pub async fn get_comment(&self, id: &str) -> Result<Option<Comment>, ApiError> {
        let comment = sqlx::query_as("SELECT * FROM comments WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch comment")?;

        Ok(comment)
    }

    pub async fn get_comments(&self) -> Result<Vec<Comment>, ApiError> {
        let comments = sqlx::query_as("SELECT * FROM comments ORDER BY rowid DESC")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch comments")?;

        Ok(comments)
    }

    pub async fn get_item_comments(&self, item: &str) -> Result<Vec<Comment>, ApiError> {
        let comments = sqlx::query_as("SELECT * FROM comments WHERE item = ? ORDER BY rowid DESC")
            .bind(item)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch item comments")?;

        Ok(comments)
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete comment")?;

        Ok(())
    }

    /// Remove every comment attached to an item. Cascade helper invoked by
    /// the routing layer when the item itself is deleted.
    pub async fn delete_item_comments(&self, item: &str) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM comments WHERE item = ?")
            .bind(item)
            .execute(&self.pool)
            .await
            .context("Failed to delete item comments")?;

        Ok(())
    }

    /// NotFound if the comment is gone; a typed author-mismatch error if the
    /// caller is not its author.
    pub async fn assert_author_is_user(&self, id: &str, user: &str) -> Result<(), ApiError> {
        let comment = self
            .get_comment(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Comment {id} does not exist!")))?;

        if comment.author != user {
            return Err(ApiError::AuthorMismatch {
                user: user.to_string(),
                resource: "comment",
                id: id.to_string(),
            });
        }
        Ok(())
    }
}
