//! Password hashing with bcrypt
//!
//! Stored records are standard `$2b$<cost>$...` strings, so the cost a
//! record was created with travels with it.

use anyhow::{Context, Result};
use tracing::debug;

use crate::domain::services::CredentialVerifier;

pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;
const MIN_COST: u32 = 4;
const MAX_COST: u32 = 31;

#[derive(Debug, Clone)]
pub struct CredentialHasher {
    cost: u32,
}

impl Default for CredentialHasher {
    fn default() -> Self {
        Self::new(DEFAULT_COST)
    }
}

impl CredentialHasher {
    /// `cost` is clamped to the range bcrypt accepts
    pub fn new(cost: u32) -> Self {
        Self {
            cost: cost.clamp(MIN_COST, MAX_COST),
        }
    }

    pub const fn cost(&self) -> u32 {
        self.cost
    }
}

impl CredentialVerifier for CredentialHasher {
    fn hash(&self, plaintext: &str) -> Result<String> {
        bcrypt::hash(plaintext, self.cost).context("Failed to hash password")
    }

    fn verify(&self, plaintext: &str, stored: &str) -> bool {
        match bcrypt::verify(plaintext, stored) {
            Ok(matches) => matches,
            Err(e) => {
                debug!("Unusable credential record: {e}");
                false
            }
        }
    }
}
