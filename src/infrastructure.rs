//! Infrastructure layer: HTTP search client, HTML parsing, SQLite storage,
//! mail delivery, credentials, configuration and logging.

pub mod account_repository;
pub mod config;
pub mod credentials;
pub mod database_connection;
pub mod filter_repository;
pub mod http_client;
pub mod logging;
pub mod mailer;
pub mod parsing;
pub mod parsing_error;

// Re-export commonly used items
pub use account_repository::SqliteAccountRepository;
pub use config::{AppConfig, ConfigManager};
pub use credentials::CredentialHasher;
pub use database_connection::DatabaseConnection;
pub use filter_repository::SqliteFilterRepository;
pub use http_client::{SearchClient, SearchClientConfig};
pub use logging::init_logging_with_config;
pub use mailer::{build_notifier, LogNotifier, SendGridNotifier};
pub use parsing::{ListingParser, ParsingConfig, ParsingError, ParsingResult};
