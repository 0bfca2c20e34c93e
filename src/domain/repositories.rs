//! Repository interfaces for accounts and saved filters
//!
//! The monitor itself only needs the read-only `AccountStore` view; the
//! wider `AccountRepository` and `SavedFilterStore` back the account and
//! filter management surface.

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::account::{Account, OwnerId};
use crate::domain::filter::{FilterPayload, SavedFilter};

/// Read-only account lookups used by monitor sessions
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn exists(&self, owner: OwnerId) -> Result<bool>;

    /// Contact address for notifications; `None` when unset, blank or
    /// unsubscribed
    async fn contact_of(&self, owner: OwnerId) -> Result<Option<String>>;
}

#[async_trait]
pub trait AccountRepository: AccountStore {
    /// Insert a new account; `Ok(None)` when the username or email is taken
    async fn create(&self, username: &str, email: &str, password_hash: &str) -> Result<Option<OwnerId>>;
    async fn find_credentials(&self, username: &str) -> Result<Option<(OwnerId, String)>>;
    async fn password_hash(&self, owner: OwnerId) -> Result<Option<String>>;
    async fn update_password(&self, owner: OwnerId, password_hash: &str) -> Result<bool>;
    async fn find_by_id(&self, owner: OwnerId) -> Result<Option<Account>>;
    async fn delete(&self, owner: OwnerId) -> Result<bool>;

    async fn unsubscribe_token(&self, owner: OwnerId) -> Result<Option<String>>;
    /// Opt the token's owner out of mail and continuous mode
    async fn unsubscribe(&self, token: &str) -> Result<Option<OwnerId>>;

    // Continuous-mode preference survives restarts
    async fn set_continuous(&self, owner: OwnerId, enabled: bool) -> Result<()>;
    async fn continuous_owners(&self) -> Result<Vec<OwnerId>>;
    async fn set_active_filter(&self, owner: OwnerId, payload: Option<&FilterPayload>) -> Result<()>;
    async fn active_filter(&self, owner: OwnerId) -> Result<Option<FilterPayload>>;
}

#[async_trait]
pub trait SavedFilterStore: Send + Sync {
    async fn save(&self, owner: OwnerId, name: &str, payload: &FilterPayload) -> Result<SavedFilter>;
    /// Newest first
    async fn list(&self, owner: OwnerId) -> Result<Vec<SavedFilter>>;
    async fn get(&self, owner: OwnerId, id: i64) -> Result<Option<SavedFilter>>;
    async fn update(&self, owner: OwnerId, id: i64, name: &str, payload: &FilterPayload) -> Result<bool>;
    async fn delete(&self, owner: OwnerId, id: i64) -> Result<bool>;
}
