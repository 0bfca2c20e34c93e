//! Collaborator contracts consumed by monitor sessions

use async_trait::async_trait;

use crate::domain::errors::MonitorError;
use crate::domain::filter::FilterPayload;
use crate::domain::listing::ListingRecord;

/// Issues one search request and returns the raw response body
#[async_trait]
pub trait ListingFetcher: Send + Sync {
    /// Any transport problem is reported as `MonitorError::Transport`
    async fn fetch(&self, payload: &FilterPayload) -> Result<String, MonitorError>;
}

/// Turns raw search markup into listing records
pub trait ListingExtractor: Send + Sync {
    /// Never fails; markup without matches yields an empty list
    fn extract(&self, raw: &str) -> Vec<ListingRecord>;
}

/// Delivers a rendered message
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Returns a human-readable delivery outcome
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<String, MonitorError>;
}

/// Password hashing and verification
pub trait CredentialVerifier: Send + Sync {
    fn hash(&self, plaintext: &str) -> anyhow::Result<String>;

    /// `false` for mismatches and for malformed stored records
    fn verify(&self, plaintext: &str, stored: &str) -> bool;
}
