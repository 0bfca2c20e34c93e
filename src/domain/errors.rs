//! Monitor error taxonomy
//!
//! Only `Configuration` ever reaches a caller of `run_once`; the other
//! variants are absorbed inside a cycle and turned into log lines or
//! summary text.

use thiserror::Error;

use super::account::OwnerId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MonitorError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Search request failed: {0}")]
    Transport(String),

    #[error("Notification failed: {0}")]
    Notification(String),

    #[error("Owner {owner} is no longer valid: {reason}")]
    IdentityInvalidated { owner: OwnerId, reason: String },

    #[error("Store lookup failed: {0}")]
    Store(String),
}

impl MonitorError {
    /// Raised when an operation needs a filter and none was applied
    pub fn missing_filter() -> Self {
        Self::Configuration("apply filters first".to_string())
    }

    pub fn identity_invalidated(owner: OwnerId, reason: impl Into<String>) -> Self {
        Self::IdentityInvalidated {
            owner,
            reason: reason.into(),
        }
    }

    /// Whether the error permanently ends a continuous monitoring loop
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::IdentityInvalidated { .. })
    }
}
