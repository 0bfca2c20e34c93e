//! Configuration infrastructure
//!
//! Settings live in `<config_dir>/auction-watch/config.json`. The file is
//! created with defaults on first run; a file that no longer parses is
//! backed up and replaced by defaults. A handful of environment variables
//! override the file after loading.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};

pub const ENV_SENDGRID_API_KEY: &str = "SENDGRID_API_KEY";
pub const ENV_POLL_SECS: &str = "AUCTION_WATCH_POLL_SECS";
pub const ENV_DATABASE_URL: &str = "AUCTION_WATCH_DB";
pub const ENV_MAIL_FROM: &str = "AUCTION_WATCH_MAIL_FROM";

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub search: SearchConfig,
    pub monitor: MonitorConfig,
    pub mail: MailConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

/// Upstream search endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Site root; the search path and detail links resolve against it
    pub base_url: String,
    pub request_timeout_secs: u64,
    /// Upper bound on outgoing search requests per minute
    pub max_requests_per_minute: u32,
    pub user_agent: String,
    /// Records kept from one response
    pub max_listings: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub poll_interval_secs: u64,
    /// Restart continuous loops on `serve`
    pub resume_on_start: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// SendGrid key; without it messages are only logged
    pub api_key: Option<String>,
    pub from_address: String,
    pub endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Empty means `<data_dir>/auction-watch/auction_watch.db`
    pub url: String,
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// "error", "warn", "info", "debug" or "trace"
    pub level: String,
    pub json_format: bool,
    pub console_output: bool,
    pub file_output: bool,
    /// Empty means `<data_dir>/auction-watch/logs`
    pub directory: String,
    /// Extra per-target directives, e.g. `sqlx=warn`
    pub module_filters: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::SEARCH_BASE_URL.to_string(),
            request_timeout_secs: defaults::REQUEST_TIMEOUT_SECONDS,
            max_requests_per_minute: defaults::MAX_REQUESTS_PER_MINUTE,
            user_agent: defaults::USER_AGENT.to_string(),
            max_listings: defaults::MAX_LISTINGS,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: defaults::POLL_INTERVAL_SECONDS,
            resume_on_start: true,
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            from_address: defaults::MAIL_FROM.to_string(),
            endpoint: defaults::SENDGRID_ENDPOINT.to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: defaults::DB_MAX_CONNECTIONS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            console_output: true,
            file_output: false,
            directory: String::new(),
            module_filters: Vec::new(),
        }
    }
}

impl SearchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

impl AppConfig {
    /// Apply the environment overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup; blank values are ignored
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(key) = value(ENV_SENDGRID_API_KEY) {
            self.mail.api_key = Some(key);
        }
        if let Some(from) = value(ENV_MAIL_FROM) {
            self.mail.from_address = from;
        }
        if let Some(url) = value(ENV_DATABASE_URL) {
            self.database.url = url;
        }
        if let Some(raw) = value(ENV_POLL_SECS) {
            match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => self.monitor.poll_interval_secs = secs,
                _ => warn!("Ignoring invalid {ENV_POLL_SECS}={raw}"),
            }
        }
    }

    /// Database URL, falling back to a file under the data directory
    pub fn database_url(&self) -> Result<String> {
        if !self.database.url.is_empty() {
            return Ok(self.database.url.clone());
        }
        let path = ConfigManager::get_app_data_dir()?.join(defaults::DB_FILE_NAME);
        Ok(format!("sqlite://{}?mode=rwc", path.display()))
    }

    pub fn log_directory(&self) -> Result<PathBuf> {
        if !self.logging.directory.is_empty() {
            return Ok(PathBuf::from(&self.logging.directory));
        }
        Ok(ConfigManager::get_app_data_dir()?.join("logs"))
    }
}

/// Loads and stores the JSON configuration file
pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join(defaults::APP_DIR_NAME);
        Ok(config_dir)
    }

    pub fn get_app_data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .context("Failed to get user data directory")?
            .join(defaults::APP_DIR_NAME);
        Ok(data_dir)
    }

    pub fn new() -> Result<Self> {
        Ok(Self {
            config_path: Self::get_config_dir()?.join(defaults::CONFIG_FILE_NAME),
        })
    }

    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    /// Load the configuration file, creating or resetting it as needed
    pub async fn load_config(&self) -> Result<AppConfig> {
        if !self.config_path.exists() {
            info!("Configuration file not found, creating default: {:?}", self.config_path);
            let config = AppConfig::default();
            self.save_config(&config).await?;
            return Ok(config);
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .context("Failed to read configuration file")?;

        match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => {
                info!("Loaded configuration from: {:?}", self.config_path);
                Ok(config)
            }
            Err(parse_error) => {
                warn!("Configuration file is invalid: {parse_error}");
                self.backup_corrupted().await;

                let config = AppConfig::default();
                self.save_config(&config)
                    .await
                    .context("Failed to save default configuration")?;
                info!("Reset to default configuration");
                Ok(config)
            }
        }
    }

    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(dir) = self.config_path.parent() {
            ensure_dir(dir).await?;
        }
        let content = serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;
        fs::write(&self.config_path, content)
            .await
            .with_context(|| format!("Failed to write configuration to {:?}", self.config_path))?;
        Ok(())
    }

    async fn backup_corrupted(&self) {
        let backup_path = self.config_path.with_extension("json.corrupted");
        match fs::copy(&self.config_path, &backup_path).await {
            Ok(_) => info!("Backed up corrupted config to: {:?}", backup_path),
            Err(e) => warn!("Failed to create backup of corrupted config: {e}"),
        }
    }
}

async fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.as_os_str().is_empty() && !dir.exists() {
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create directory: {dir:?}"))?;
    }
    Ok(())
}

pub mod defaults {
    pub const APP_DIR_NAME: &str = "auction-watch";
    pub const CONFIG_FILE_NAME: &str = "config.json";
    pub const DB_FILE_NAME: &str = "auction_watch.db";

    pub const SEARCH_BASE_URL: &str = "https://www.iaai.com";

    /// Search request timeout in seconds
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 20;

    pub const MAX_REQUESTS_PER_MINUTE: u32 = 30;

    pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

    /// Listings kept from a single search response
    pub const MAX_LISTINGS: usize = 200;

    /// Sleep between continuous-mode cycles (10 minutes)
    pub const POLL_INTERVAL_SECONDS: u64 = 600;

    pub const MAIL_FROM: &str = "alerts@auction-watch.local";
    pub const SENDGRID_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";

    pub const DB_MAX_CONNECTIONS: u32 = 5;
}
