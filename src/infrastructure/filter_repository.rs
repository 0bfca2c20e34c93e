//! SQLite saved-filter repository; every query is scoped by owner

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

use crate::domain::repositories::SavedFilterStore;
use crate::domain::{FilterPayload, OwnerId, SavedFilter};

#[derive(Debug, FromRow)]
struct SavedFilterRow {
    id: i64,
    owner_id: i64,
    name: String,
    payload: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<SavedFilterRow> for SavedFilter {
    type Error = anyhow::Error;

    fn try_from(row: SavedFilterRow) -> Result<Self> {
        let payload = serde_json::from_str(&row.payload)
            .with_context(|| format!("Saved filter {} has an invalid payload", row.id))?;
        Ok(Self {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            payload,
            created_at: row.created_at,
        })
    }
}

#[derive(Clone)]
pub struct SqliteFilterRepository {
    pool: SqlitePool,
}

impl SqliteFilterRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SavedFilterStore for SqliteFilterRepository {
    async fn save(&self, owner: OwnerId, name: &str, payload: &FilterPayload) -> Result<SavedFilter> {
        let created_at = Utc::now();
        let encoded = serde_json::to_string(payload).context("Failed to encode filter payload")?;
        let done = sqlx::query("INSERT INTO saved_filters (owner_id, name, payload, created_at) VALUES (?, ?, ?, ?)")
            .bind(owner)
            .bind(name)
            .bind(&encoded)
            .bind(created_at)
            .execute(&self.pool)
            .await
            .context("Failed to save filter")?;

        Ok(SavedFilter {
            id: done.last_insert_rowid(),
            owner_id: owner,
            name: name.to_string(),
            payload: payload.clone(),
            created_at,
        })
    }

    async fn list(&self, owner: OwnerId) -> Result<Vec<SavedFilter>> {
        let rows: Vec<SavedFilterRow> = sqlx::query_as(
            "SELECT id, owner_id, name, payload, created_at FROM saved_filters
             WHERE owner_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list saved filters")?;

        rows.into_iter().map(SavedFilter::try_from).collect()
    }

    async fn get(&self, owner: OwnerId, id: i64) -> Result<Option<SavedFilter>> {
        let row: Option<SavedFilterRow> = sqlx::query_as(
            "SELECT id, owner_id, name, payload, created_at FROM saved_filters WHERE id = ? AND owner_id = ?",
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load saved filter")?;

        row.map(SavedFilter::try_from).transpose()
    }

    async fn update(&self, owner: OwnerId, id: i64, name: &str, payload: &FilterPayload) -> Result<bool> {
        let encoded = serde_json::to_string(payload).context("Failed to encode filter payload")?;
        let done = sqlx::query("UPDATE saved_filters SET name = ?, payload = ? WHERE id = ? AND owner_id = ?")
            .bind(name)
            .bind(&encoded)
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await
            .context("Failed to update saved filter")?;
        Ok(done.rows_affected() > 0)
    }

    async fn delete(&self, owner: OwnerId, id: i64) -> Result<bool> {
        let done = sqlx::query("DELETE FROM saved_filters WHERE id = ? AND owner_id = ?")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await
            .context("Failed to delete saved filter")?;
        Ok(done.rows_affected() > 0)
    }
}
