//! SQLite account repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::domain::repositories::{AccountRepository, AccountStore};
use crate::domain::{Account, FilterPayload, OwnerId};

#[derive(Debug, FromRow)]
struct AccountRow {
    id: i64,
    username: String,
    email: String,
    email_unsubscribed: bool,
    continuous_enabled: bool,
    created_at: DateTime<Utc>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            email_unsubscribed: row.email_unsubscribed,
            continuous_enabled: row.continuous_enabled,
            created_at: row.created_at,
        }
    }
}

#[derive(Clone)]
pub struct SqliteAccountRepository {
    pool: SqlitePool,
}

impl SqliteAccountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for SqliteAccountRepository {
    async fn exists(&self, owner: OwnerId) -> Result<bool> {
        let found: Option<(i64,)> = sqlx::query_as("SELECT id FROM accounts WHERE id = ?")
            .bind(owner)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to look up account")?;
        Ok(found.is_some())
    }

    async fn contact_of(&self, owner: OwnerId) -> Result<Option<String>> {
        let email: Option<(String,)> =
            sqlx::query_as("SELECT email FROM accounts WHERE id = ? AND email_unsubscribed = 0")
                .bind(owner)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to look up contact address")?;
        Ok(email
            .map(|(email,)| email.trim().to_string())
            .filter(|email| !email.is_empty()))
    }
}

#[async_trait]
impl AccountRepository for SqliteAccountRepository {
    async fn create(&self, username: &str, email: &str, password_hash: &str) -> Result<Option<OwnerId>> {
        let result = sqlx::query(
            "INSERT INTO accounts (username, email, password_hash, unsubscribe_token, continuous_enabled, created_at) \
             VALUES (?, ?, ?, ?, 0, ?)",
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(Uuid::new_v4().simple().to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(Some(done.last_insert_rowid())),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(None),
            Err(e) => Err(e).context("Failed to create account"),
        }
    }

    async fn find_credentials(&self, username: &str) -> Result<Option<(OwnerId, String)>> {
        sqlx::query_as("SELECT id, password_hash FROM accounts WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to look up credentials")
    }

    async fn password_hash(&self, owner: OwnerId) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT password_hash FROM accounts WHERE id = ?")
            .bind(owner)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to look up credentials")?;
        Ok(row.map(|(hash,)| hash))
    }

    async fn update_password(&self, owner: OwnerId, password_hash: &str) -> Result<bool> {
        let done = sqlx::query("UPDATE accounts SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(owner)
            .execute(&self.pool)
            .await
            .context("Failed to update password")?;
        Ok(done.rows_affected() > 0)
    }

    async fn find_by_id(&self, owner: OwnerId) -> Result<Option<Account>> {
        let row: Option<AccountRow> = sqlx::query_as(
            "SELECT id, username, email, email_unsubscribed, continuous_enabled, created_at FROM accounts WHERE id = ?",
        )
        .bind(owner)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load account")?;
        Ok(row.map(Account::from))
    }

    async fn delete(&self, owner: OwnerId) -> Result<bool> {
        let done = sqlx::query("DELETE FROM accounts WHERE id = ?")
            .bind(owner)
            .execute(&self.pool)
            .await
            .context("Failed to delete account")?;
        Ok(done.rows_affected() > 0)
    }

    async fn unsubscribe_token(&self, owner: OwnerId) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT unsubscribe_token FROM accounts WHERE id = ?")
            .bind(owner)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to look up unsubscribe token")?;
        Ok(row.map(|(token,)| token))
    }

    async fn unsubscribe(&self, token: &str) -> Result<Option<OwnerId>> {
        let row: Option<(i64,)> = sqlx::query_as(
            "UPDATE accounts SET email_unsubscribed = 1, continuous_enabled = 0 \
             WHERE unsubscribe_token = ? RETURNING id",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to unsubscribe")?;
        Ok(row.map(|(id,)| id))
    }

    async fn set_continuous(&self, owner: OwnerId, enabled: bool) -> Result<()> {
        sqlx::query("UPDATE accounts SET continuous_enabled = ? WHERE id = ?")
            .bind(enabled)
            .bind(owner)
            .execute(&self.pool)
            .await
            .context("Failed to update continuous preference")?;
        Ok(())
    }

    async fn continuous_owners(&self) -> Result<Vec<OwnerId>> {
        let rows: Vec<(i64,)> = sqlx::query_as("SELECT id FROM accounts WHERE continuous_enabled = 1 ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list continuous owners")?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn set_active_filter(&self, owner: OwnerId, payload: Option<&FilterPayload>) -> Result<()> {
        let encoded = payload
            .map(serde_json::to_string)
            .transpose()
            .context("Failed to encode filter payload")?;
        sqlx::query("UPDATE accounts SET active_filter = ? WHERE id = ?")
            .bind(encoded)
            .bind(owner)
            .execute(&self.pool)
            .await
            .context("Failed to store active filter")?;
        Ok(())
    }

    async fn active_filter(&self, owner: OwnerId) -> Result<Option<FilterPayload>> {
        let row: Option<(Option<String>,)> = sqlx::query_as("SELECT active_filter FROM accounts WHERE id = ?")
            .bind(owner)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load active filter")?;

        match row.and_then(|(encoded,)| encoded) {
            Some(encoded) => Ok(Some(
                serde_json::from_str(&encoded).context("Stored filter payload is not valid JSON")?,
            )),
            None => Ok(None),
        }
    }
}
