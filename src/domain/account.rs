use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of the end user a monitor session runs for
pub type OwnerId = i64;

/// Registered account as seen by the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: OwnerId,
    pub username: String,
    pub email: String,
    /// Opted out of notification mail
    #[serde(rename = "emailUnsubscribed")]
    pub email_unsubscribed: bool,
    #[serde(rename = "continuousEnabled")]
    pub continuous_enabled: bool,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}
