//! Application context
//!
//! Builds every long-lived component once from the loaded configuration
//! and hands them to the presentation layer.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::application::account_service::AccountService;
use crate::application::monitor_session::{MonitorDeps, MonitorSettings};
use crate::application::session_directory::SessionDirectory;
use crate::application::watch_service::WatchService;
use crate::domain::repositories::{AccountRepository, AccountStore, SavedFilterStore};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::parsing::ParsingConfig;
use crate::infrastructure::{
    build_notifier, CredentialHasher, DatabaseConnection, ListingParser, SearchClient, SearchClientConfig,
    SqliteAccountRepository, SqliteFilterRepository,
};

pub struct AppContext {
    pub config: AppConfig,
    pub database: DatabaseConnection,
    pub accounts: AccountService,
    pub watch: WatchService,
}

impl AppContext {
    pub async fn initialize(config: AppConfig) -> Result<Self> {
        let database_url = config.database_url()?;
        let database = DatabaseConnection::with_max_connections(&database_url, config.database.max_connections).await?;
        database.migrate().await?;

        let account_repo = Arc::new(SqliteAccountRepository::new(database.pool().clone()));
        let filter_repo: Arc<dyn SavedFilterStore> = Arc::new(SqliteFilterRepository::new(database.pool().clone()));

        let fetcher = SearchClient::new(SearchClientConfig::from_config(&config.search)?)
            .context("Failed to build search client")?;
        let parser = ListingParser::with_config(&ParsingConfig {
            base_url: config.search.base_url.clone(),
            max_listings: config.search.max_listings,
            ..ParsingConfig::default()
        })?;

        let account_store: Arc<dyn AccountStore> = account_repo.clone();
        let deps = MonitorDeps {
            fetcher: Arc::new(fetcher),
            extractor: Arc::new(parser),
            notifier: build_notifier(&config.mail)?,
            accounts: account_store,
        };
        let settings = MonitorSettings {
            poll_interval: config.monitor.poll_interval(),
        };
        let directory = Arc::new(SessionDirectory::new(deps, settings));

        let repository: Arc<dyn AccountRepository> = account_repo;
        let accounts = AccountService::new(
            repository.clone(),
            Arc::new(CredentialHasher::default()),
            directory.clone(),
        )?;
        let watch = WatchService::new(repository, filter_repo, directory);

        info!(
            poll_interval_secs = config.monitor.poll_interval_secs,
            "Application context initialized"
        );
        Ok(Self {
            config,
            database,
            accounts,
            watch,
        })
    }
}
