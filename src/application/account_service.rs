//! Sign-up, sign-in, password changes, unsubscribing and account removal
//!
//! Every path that ends an owner's access (sign-out, deletion) removes the
//! owner's monitor session from the directory so no orphaned loop keeps
//! mailing the old contact address.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::application::monitor_session::MonitorSession;
use crate::application::session_directory::SessionDirectory;
use crate::domain::repositories::AccountRepository;
use crate::domain::services::CredentialVerifier;
use crate::domain::{Account, OwnerId};

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Password must be at least {} characters", MIN_PASSWORD_LEN)]
    WeakPassword,

    #[error("Username or email already registered")]
    Duplicate,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Current password is incorrect")]
    IncorrectPassword,

    #[error("Invalid unsubscribe link")]
    InvalidToken,

    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

/// Authenticated owner together with their live session
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub owner: OwnerId,
    pub session: Arc<MonitorSession>,
}

pub struct AccountService {
    accounts: Arc<dyn AccountRepository>,
    credentials: Arc<dyn CredentialVerifier>,
    directory: Arc<SessionDirectory>,
    // Verified against when the username is unknown
    dummy_record: String,
}

impl AccountService {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        credentials: Arc<dyn CredentialVerifier>,
        directory: Arc<SessionDirectory>,
    ) -> anyhow::Result<Self> {
        let dummy_record = credentials.hash("not-a-real-password")?;
        Ok(Self {
            accounts,
            credentials,
            directory,
            dummy_record,
        })
    }

    pub async fn sign_up(&self, username: &str, email: &str, password: &str) -> Result<SignedIn, AccountError> {
        let username = required("username", username)?;
        let email = required("email", email)?;
        check_new_password("password", password)?;

        let hash = self.hash_password(password).await?;
        let owner = self
            .accounts
            .create(username, email, &hash)
            .await?
            .ok_or(AccountError::Duplicate)?;

        info!(owner, username, "Account created");
        Ok(SignedIn {
            owner,
            session: self.directory.get_or_create(owner),
        })
    }

    pub async fn sign_in(&self, username: &str, password: &str) -> Result<SignedIn, AccountError> {
        let username = required("username", username)?;
        if password.is_empty() {
            return Err(AccountError::MissingField("password"));
        }

        let Some((owner, stored)) = self.accounts.find_credentials(username).await? else {
            self.verify_password(password, self.dummy_record.clone()).await;
            return Err(AccountError::InvalidCredentials);
        };

        if !self.verify_password(password, stored).await {
            warn!(owner, "Rejected sign-in attempt");
            return Err(AccountError::InvalidCredentials);
        }

        Ok(SignedIn {
            owner,
            session: self.directory.get_or_create(owner),
        })
    }

    /// Replace the password after checking the current one
    pub async fn change_password(&self, owner: OwnerId, current: &str, new: &str) -> Result<(), AccountError> {
        if current.is_empty() {
            return Err(AccountError::MissingField("current password"));
        }
        check_new_password("new password", new)?;

        let stored = self.accounts.password_hash(owner).await?;
        let Some(stored) = stored else {
            self.verify_password(current, self.dummy_record.clone()).await;
            return Err(AccountError::InvalidCredentials);
        };
        if !self.verify_password(current, stored).await {
            warn!(owner, "Rejected password change");
            return Err(AccountError::IncorrectPassword);
        }

        let hash = self.hash_password(new).await?;
        if !self.accounts.update_password(owner, &hash).await? {
            return Err(AccountError::InvalidCredentials);
        }
        info!(owner, "Password changed");
        Ok(())
    }

    /// Opt the token's owner out of notification mail.
    ///
    /// A running loop for that owner stops at its next identity check,
    /// before fetching or mailing again.
    pub async fn unsubscribe(&self, token: &str) -> Result<OwnerId, AccountError> {
        let token = required("token", token)?;
        let owner = self
            .accounts
            .unsubscribe(token)
            .await?
            .ok_or(AccountError::InvalidToken)?;
        info!(owner, "Unsubscribed from notification mail");
        Ok(owner)
    }

    pub async fn unsubscribe_token(&self, owner: OwnerId) -> Result<Option<String>, AccountError> {
        Ok(self.accounts.unsubscribe_token(owner).await?)
    }

    pub async fn account(&self, owner: OwnerId) -> Result<Option<Account>, AccountError> {
        Ok(self.accounts.find_by_id(owner).await?)
    }

    /// Stop and drop the owner's session and forget continuous mode
    pub async fn sign_out(&self, owner: OwnerId) -> Result<(), AccountError> {
        self.directory.remove(owner);
        self.accounts.set_continuous(owner, false).await?;
        info!(owner, "Signed out");
        Ok(())
    }

    /// Remove the session, then the account and its saved filters
    pub async fn delete_account(&self, owner: OwnerId) -> Result<bool, AccountError> {
        self.directory.remove(owner);
        let deleted = self.accounts.delete(owner).await?;
        if deleted {
            info!(owner, "Account deleted");
        }
        Ok(deleted)
    }
}

impl AccountService {
    // bcrypt is CPU bound; run it on the blocking pool
    async fn hash_password(&self, password: &str) -> Result<String, AccountError> {
        let credentials = Arc::clone(&self.credentials);
        let password = password.to_owned();
        let hash = tokio::task::spawn_blocking(move || credentials.hash(&password))
            .await
            .map_err(anyhow::Error::from)??;
        Ok(hash)
    }

    async fn verify_password(&self, password: &str, stored: String) -> bool {
        let credentials = Arc::clone(&self.credentials);
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || credentials.verify(&password, &stored))
            .await
            .unwrap_or(false)
    }
}

fn check_new_password(field: &'static str, password: &str) -> Result<(), AccountError> {
    if password.is_empty() {
        return Err(AccountError::MissingField(field));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AccountError::WeakPassword);
    }
    Ok(())
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, AccountError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(AccountError::MissingField(field))
    } else {
        Ok(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_trims_and_rejects_blank() {
        assert_eq!(required("username", "  alice ").unwrap(), "alice");
        assert!(matches!(
            required("email", "   "),
            Err(AccountError::MissingField("email"))
        ));
    }

    #[test]
    fn new_password_must_be_present_and_long_enough() {
        assert!(matches!(
            check_new_password("new password", ""),
            Err(AccountError::MissingField("new password"))
        ));
        assert!(matches!(check_new_password("password", "short"), Err(AccountError::WeakPassword)));
        assert!(check_new_password("password", "long enough").is_ok());
    }

    #[test]
    fn weak_password_message_names_the_minimum() {
        assert_eq!(
            AccountError::WeakPassword.to_string(),
            "Password must be at least 8 characters"
        );
    }
}
