//! Logging system configuration and initialization
//!
//! Console output plus an optional daily-rotated log file written through a
//! non-blocking appender. `RUST_LOG` wins over the configured level when set.
//!
//! ```bash
//! # Show SQL statements while debugging
//! RUST_LOG="debug,sqlx::query=debug" auction-watch run-once -u alice
//! ```

use std::path::Path;
use std::sync::{Mutex, PoisonError};

use anyhow::{anyhow, Context, Result};
use lazy_static::lazy_static;
use tracing::info;
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::{self, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

pub use crate::infrastructure::config::LoggingConfig;

pub const LOG_FILE_PREFIX: &str = "auction-watch.log";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

// Keeps the file writer alive for the life of the process
lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<WorkerGuard>> = Mutex::new(Vec::new());
}

/// Filter for the configured level with chatty dependencies quietened.
///
/// At `trace` every target is left alone.
pub fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let mut filter = EnvFilter::try_new(&config.level)
        .with_context(|| format!("Invalid log level: {}", config.level))?;

    if !config.level.to_lowercase().contains("trace") {
        for directive in [
            "sqlx::query=warn",
            "sqlx::sqlite=warn",
            "reqwest=info",
            "hyper=warn",
            "hyper_util=warn",
            "h2=warn",
            "rustls=warn",
            "html5ever=warn",
            "selectors=warn",
        ] {
            filter = filter.add_directive(directive.parse()?);
        }
    }

    for directive in &config.module_filters {
        filter = filter.add_directive(
            directive
                .parse()
                .with_context(|| format!("Invalid log directive: {directive}"))?,
        );
    }

    Ok(filter)
}

/// Install the global subscriber; `log_dir` is required for file output
pub fn init_logging_with_config(config: &LoggingConfig, log_dir: Option<&Path>) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => build_env_filter(config)?,
    };

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if config.file_output {
        let log_dir = log_dir.ok_or_else(|| anyhow!("File logging enabled without a log directory"))?;
        std::fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory {log_dir:?}"))?;

        let (writer, guard) = non_blocking(rolling::daily(log_dir, LOG_FILE_PREFIX));
        LOG_GUARDS.lock().unwrap_or_else(PoisonError::into_inner).push(guard);

        let file_layer = fmt::Layer::new()
            .with_writer(writer)
            .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
            .with_ansi(false);
        if config.json_format {
            layers.push(
                file_layer
                    .json()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .boxed(),
            );
        } else {
            layers.push(file_layer.with_target(false).boxed());
        }
    }

    if config.console_output {
        let console_layer = fmt::Layer::new()
            .with_writer(std::io::stderr)
            .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
            .with_target(false);
        if config.json_format {
            layers.push(console_layer.json().boxed());
        } else {
            layers.push(console_layer.boxed());
        }
    }

    if layers.is_empty() {
        return Err(anyhow!("No logging output configured"));
    }

    Registry::default()
        .with(layers)
        .with(env_filter)
        .try_init()
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {e}"))?;

    info!(
        level = %config.level,
        json = config.json_format,
        file = config.file_output,
        "Logging system initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_accepts_configured_level_and_modules() {
        let config = LoggingConfig {
            level: "debug".to_string(),
            module_filters: vec!["auction_watch::infrastructure=trace".to_string()],
            ..LoggingConfig::default()
        };
        let filter = build_env_filter(&config).unwrap();
        let rendered = filter.to_string();
        assert!(rendered.contains("sqlx::query=warn"));
        assert!(rendered.contains("auction_watch::infrastructure=trace"));
    }

    #[test]
    fn trace_level_keeps_dependency_logs() {
        let config = LoggingConfig {
            level: "trace".to_string(),
            ..LoggingConfig::default()
        };
        let rendered = build_env_filter(&config).unwrap().to_string();
        assert!(!rendered.contains("sqlx::query"));
    }

    #[test]
    fn bad_module_directive_is_reported() {
        let config = LoggingConfig {
            module_filters: vec!["sqlx=loud".to_string()],
            ..LoggingConfig::default()
        };
        assert!(build_env_filter(&config).is_err());
    }

    #[test]
    fn no_outputs_is_an_error() {
        let config = LoggingConfig {
            console_output: false,
            file_output: false,
            ..LoggingConfig::default()
        };
        assert!(init_logging_with_config(&config, None).is_err());
    }
}
