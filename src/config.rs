//! Application configuration: provider credentials and quotas, catalog store
//! location, logging, and export paths.
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then `LITHARVEST_*` environment variables, then the provider credential
//! variables (`SCOPUS_API_KEY`, `SCOPUS_API_URL`). Missing credentials are
//! the only fatal configuration error for an ingestion run.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// External search provider settings
    pub provider: ProviderConfig,
    /// Catalog store settings
    pub database: DatabaseConfig,
    /// Logging settings
    pub logging: LoggingConfig,
    /// Export settings
    pub export: ExportConfig,
}

/// Settings for the external scholarly search provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider name used for registry lookup, e.g. "scopus"
    pub name: String,
    /// API key for the provider
    pub api_key: String,
    /// Base URL of the provider search endpoint
    pub api_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Provider hard cap on entries per page
    pub max_results_per_request: u32,
    /// Retry attempts for transient request failures
    pub retry_count: u32,
    /// Exponential backoff factor between retries
    pub retry_backoff: f64,
    /// Initial retry delay in milliseconds
    pub retry_base_delay_ms: u64,
    /// Seconds to pause between successful page requests
    pub rate_limit_pause_secs: f64,
    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: "scopus".to_string(),
            api_key: String::new(),
            api_url: String::new(),
            timeout_secs: 30,
            connect_timeout_secs: 10,
            max_results_per_request: 100,
            retry_count: 3,
            retry_backoff: 1.5,
            retry_base_delay_ms: 500,
            rate_limit_pause_secs: 1.0,
            user_agent: format!("litharvest/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ProviderConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    #[must_use]
    pub fn rate_limit_pause(&self) -> Duration {
        Duration::from_secs_f64(self.rate_limit_pause_secs)
    }

    #[must_use]
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

/// Catalog store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            path: base.join("litharvest").join("papers.db"),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter: trace, debug, info, warn, error
    pub level: String,
    /// Output format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Export settings for batch result envelopes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory where result envelopes are written
    pub directory: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            directory: base.join("litharvest").join("requests"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, an optional file and the environment.
    ///
    /// `.env` is read first so credential variables behave the same whether
    /// they come from the shell or a local dotfile.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default())?);

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("LITHARVEST")
                .separator("__")
                .try_parsing(true),
        );

        let mut cfg: Config = builder.build()?.try_deserialize()?;

        // Provider credentials keep their conventional variable names
        if let Ok(key) = std::env::var("SCOPUS_API_KEY") {
            cfg.provider.api_key = key;
        }
        if let Ok(url) = std::env::var("SCOPUS_API_URL") {
            cfg.provider.api_url = url;
        }

        Ok(cfg)
    }

    /// Load configuration from a specific file, still applying env overrides
    pub fn load_from_file(path: &Path) -> Result<Self> {
        Self::load(Some(path))
    }

    /// Validate the configuration.
    ///
    /// Only credential/endpoint problems are fatal; everything else has a
    /// workable default.
    pub fn validate(&self) -> Result<()> {
        if self.provider.api_key.trim().is_empty() {
            return Err(Error::MissingCredential("SCOPUS_API_KEY".to_string()));
        }
        if self.provider.api_url.trim().is_empty() {
            return Err(Error::MissingCredential("SCOPUS_API_URL".to_string()));
        }
        if self.provider.max_results_per_request == 0 {
            return Err(Error::InvalidInput {
                field: "provider.max_results_per_request".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.provider.retry_backoff <= 0.0 {
            return Err(Error::InvalidInput {
                field: "provider.retry_backoff".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.provider.rate_limit_pause_secs < 0.0 {
            return Err(Error::InvalidInput {
                field: "provider.rate_limit_pause_secs".to_string(),
                reason: "must not be negative".to_string(),
            });
        }
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(Error::InvalidInput {
                field: "logging.level".to_string(),
                reason: format!("invalid log level, expected one of {valid_levels:?}"),
            });
        }
        Ok(())
    }
}
