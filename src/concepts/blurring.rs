use std::io::Cursor;

use anyhow::Context;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::{new_id, now};
use crate::error::ApiError;

/// Gaussian radius used when the caller gives no intensity.
const DEFAULT_BLUR_RADIUS: f32 = 20.0;

/// A record saying `user_id` wants `filtered_user`'s content obscured.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BlurFilter {
    pub id: String,
    pub user_id: String,
    pub filtered_user: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Concept: Blurring. Owns the `blur_filters` collection and the image
/// blur pipeline. The raster work is delegated to the `image` crate; the
/// source bytes are fetched over HTTP.
#[derive(Debug, Clone)]
pub struct Blurring {
    pool: SqlitePool,
    http: reqwest::Client,
}

impl Blurring {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            http: reqwest::Client::new(),
        }
    }

    /// Fetch the image at `image_url`, blur it, and return PNG bytes.
    ///
    /// The user-facing intensity is a percentage; the effective radius is
    /// `intensity / 5` clamped to `[0, 20]`, defaulting to the maximum.
    pub async fn blur(&self, image_url: &str, intensity: Option<f32>) -> Result<Vec<u8>, ApiError> {
        let bytes = self
            .http
            .get(image_url)
            .send()
            .await
            .context("Failed to fetch image for blurring")?
            .error_for_status()
            .context("Image fetch returned an error status")?
            .bytes()
            .await
            .context("Failed to read image bytes")?;

        let radius = blur_radius(intensity);

        let image = image::load_from_memory(&bytes).context("Failed to decode image")?;
        let blurred = image.blur(radius);

        let mut out = Cursor::new(Vec::new());
        blurred
            .write_to(&mut out, image::ImageOutputFormat::Png)
            .context("Failed to encode blurred image")?;

        Ok(out.into_inner())
    }

    /// Does `user` want `other_user`'s content obscured?
    pub async fn in_filter(&self, user: &str, other_user: &str) -> Result<bool, ApiError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT id FROM blur_filters WHERE user_id = ? AND filtered_user = ?")
                .bind(user)
                .bind(other_user)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to check blur filter")?;

        Ok(row.is_some())
    }

    /// Add `filtered_user` to `user`'s filter set. Idempotent.
    pub async fn add_filter(&self, user: &str, filtered_user: &str) -> Result<(), ApiError> {
        if self.in_filter(user, filtered_user).await? {
            return Ok(());
        }

        let timestamp = now();
        sqlx::query(
            r"
            INSERT INTO blur_filters (id, user_id, filtered_user, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ",
        )
        .bind(new_id())
        .bind(user)
        .bind(filtered_user)
        .bind(&timestamp)
        .bind(&timestamp)
        .execute(&self.pool)
        .await
        .context("Failed to insert blur filter")?;

        Ok(())
    }

    pub async fn remove_filter(&self, user: &str, filtered_user: &str) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM blur_filters WHERE user_id = ? AND filtered_user = ?")
            .bind(user)
            .bind(filtered_user)
            .execute(&self.pool)
            .await
            .context("Failed to delete blur filter")?;

        Ok(())
    }

    /// Ids of the users whose content `user` wants obscured.
    pub async fn get_filters(&self, user: &str) -> Result<Vec<String>, ApiError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT filtered_user FROM blur_filters WHERE user_id = ? ORDER BY rowid")
                .bind(user)
                .fetch_all(&self.pool)
                .await
                .context("Failed to fetch blur filters")?;

        Ok(rows.into_iter().map(|(filtered,)| filtered).collect())
    }
}

/// Map a user-facing intensity percentage to a Gaussian radius.
fn blur_radius(intensity: Option<f32>) -> f32 {
    intensity.map_or(DEFAULT_BLUR_RADIUS, |i| (i / 5.0).clamp(0.0, 20.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blur_radius_default() {
        assert!((blur_radius(None) - 20.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_blur_radius_scaling_and_clamp() {
        assert!((blur_radius(Some(50.0)) - 10.0).abs() < f32::EPSILON);
        assert!((blur_radius(Some(500.0)) - 20.0).abs() < f32::EPSILON);
        assert!((blur_radius(Some(-5.0)) - 0.0).abs() < f32::EPSILON);
    }
}
