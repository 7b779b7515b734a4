use anyhow::Context;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::{new_id, now};
use crate::error::ApiError;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Report {
    pub id: String,
    pub item: String,
    pub info: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Concept: Reporting. Owns the `reports` collection. Only stores and
/// deletes report records; adjudication side effects live in the routing
/// layer.
#[derive(Debug, Clone)]
pub struct Reporting {
    pool: SqlitePool,
}

impl Reporting {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// File a report against an item, with optional free-text info.
    pub async fn create(&self, item: &str, info: Option<&str>) -> Result<Report, ApiError> {
        let id = new_id();
        let timestamp = now();

        sqlx::query(
            r"
            INSERT INTO reports (id, item, info, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ",
        )
        .bind(&id)
        .bind(item)
        .bind(info)
        .bind(&timestamp)
        .bind(&timestamp)
        .execute(&self.pool)
        .await
        .context("Failed to insert report")?;

        let report = sqlx::query_as("SELECT * FROM reports WHERE id = ?")
            .bind(&id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to fetch created report")?;

        Ok(report)
    }

    pub async fn get_reports(&self) -> Result<Vec<Report>, ApiError> {
        let reports = sqlx::query_as("SELECT * FROM reports ORDER BY rowid DESC")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch reports")?;

        Ok(reports)
    }

    pub async fn get_report(&self, id: &str) -> Result<Option<Report>, ApiError> {
        let report = sqlx::query_as("SELECT * FROM reports WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch report")?;

        Ok(report)
    }

    pub async fn remove(&self, id: &str) -> Result<(), ApiError> {
        let report = self.get_report(id).await?;
        if report.is_none() {
            return Err(ApiError::NotFound(format!("Report {id} does not exist!")));
        }

        sqlx::query("DELETE FROM reports WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete report")?;

        Ok(())
    }
}
