use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::db::{new_id, now};
use crate::error::ApiError;

/// Matches the file id inside a Google Drive share link, in either the
/// `/file/d/<id>/view` or the `?id=<id>` form.
static DRIVE_FILE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:/d/|id=)([^/?]+)").expect("drive file id regex is valid"));

/// Optional display options for a post.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Post {
    pub id: String,
    pub author: String,
    pub image: String,
    pub caption: String,
    pub background_color: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Concept: Posting. Owns the `posts` collection.
#[derive(Debug, Clone)]
pub struct Posting {
    pool: SqlitePool,
}

impl Posting {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a post. The image must be a Google Drive share link, which is
    /// rewritten into a direct-viewing URL before storage.
    pub async fn create(
        &self,
        author: &str,
        image: &str,
        caption: &str,
        options: Option<&PostOptions>,
    ) -> Result<Post, ApiError> {
        let url = direct_image_url(image)?;

        let id = new_id();
        let timestamp = now();

        sqlx::query(
            r"
            INSERT INTO posts (id, author, image, caption, background_color, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&id)
        .bind(author)
        .bind(&url)
        .bind(caption)
        .bind(options.and_then(|o| o.background_color.as_deref()))
        .bind(&timestamp)
        .bind(&timestamp)
        .execute(&self.pool)
        .await
        .context("Failed to insert post")?;

        let post = self.get_post(&id).await?;
        post.ok_or_else(|| ApiError::NotFound("Post not found!".to_string()))
    }

    pub async fn get_post(&self, id: &str) -> Result<Option<Post>, ApiError> {
        let post = sqlx::query_as("SELECT * FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch post")?;

        Ok(post)
    }

    /// All posts in reverse-creation order. No pagination; known scaling
    /// limitation carried over from the design.
    pub async fn get_posts(&self) -> Result<Vec<Post>, ApiError> {
        let posts = sqlx::query_as("SELECT * FROM posts ORDER BY rowid DESC")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch posts")?;

        Ok(posts)
    }

    pub async fn get_by_author(&self, author: &str) -> Result<Vec<Post>, ApiError> {
        let posts = sqlx::query_as("SELECT * FROM posts WHERE author = ? ORDER BY rowid DESC")
            .bind(author)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch posts by author")?;

        Ok(posts)
    }

    /// Partial update: an omitted field is left unchanged, never cleared.
    pub async fn update(
        &self,
        id: &str,
        caption: Option<&str>,
        options: Option<&PostOptions>,
    ) -> Result<(), ApiError> {
        sqlx::query(
            r"
            UPDATE posts
            SET caption = COALESCE(?, caption),
                background_color = COALESCE(?, background_color),
                updated_at = ?
            WHERE id = ?
            ",
        )
        .bind(caption)
        .bind(options.and_then(|o| o.background_color.as_deref()))
        .bind(now())
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to update post")?;

        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete post")?;

        Ok(())
    }

    /// NotFound if the post is gone; a typed author-mismatch error if the
    /// caller is not its author.
    pub async fn assert_author_is_user(&self, id: &str, user: &str) -> Result<(), ApiError> {
        let post = self
            .get_post(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Post {id} does not exist!")))?;

        if post.author != user {
            return Err(ApiError::AuthorMismatch {
                user: user.to_string(),
                resource: "post",
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

/// Convert a Google Drive share link into a direct-viewing URL.
fn direct_image_url(url: &str) -> Result<String, ApiError> {
    let file_id = DRIVE_FILE_ID
        .captures(url)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| {
            ApiError::NotFound("Image link is not in the appropriate format.".to_string())
        })?;

    Ok(format!(
        "https://drive.google.com/uc?export=view&id={file_id}"
    ))
}
