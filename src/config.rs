//! Configuration management for quickkv
//!
//! Configuration is read from an optional TOML file and `QUICKKV_`-prefixed
//! environment variables, in that order of precedence (environment wins).
//! Nested keys use `__` in variable names, e.g.
//! `QUICKKV_BACKEND__REMOTE_CACHE__PORT=6380`.

use crate::error::{QuickKvError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "QUICKKV_CONFIG";

/// Configuration file read when `QUICKKV_CONFIG` is not set
pub const DEFAULT_CONFIG_FILE: &str = "quickkv.toml";

const ENV_PREFIX: &str = "QUICKKV";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub logging: LoggingConfig,
}

/// Which backend a [`crate::Store`] is built on, plus the settings of each
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub document: DocumentStoreConfig,
    pub remote_cache: RemoteCacheConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Memory,
    Document,
    RemoteCache,
}

/// MongoDB connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentStoreConfig {
    pub host: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: String,
    pub collection: String,
}

/// Redis connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteCacheConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub database: i64,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub file_path: Option<PathBuf>,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
    Compact,
}

impl Default for DocumentStoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost:27017".to_string(),
            user: None,
            password: None,
            database: "_mongo_token_store".to_string(),
            collection: "default_token_store".to_string(),
        }
    }
}

impl Default for RemoteCacheConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            password: None,
            database: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from the default file (if present) and environment
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let explicit = std::env::var_os(CONFIG_PATH_ENV).is_some();

        let config: Config = config::Config::builder()
            .add_source(config::File::with_name(&path).required(explicit))
            .add_source(environment())
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file only
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: Config = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Check the values that deserialization alone cannot
    pub fn validate(&self) -> Result<()> {
        match self.backend.kind {
            BackendKind::Memory => {}
            BackendKind::Document => {
                let document = &self.backend.document;
                require_non_empty(&document.host, "backend.document.host")?;
                require_non_empty(&document.database, "backend.document.database")?;
                require_non_empty(&document.collection, "backend.document.collection")?;
            }
            BackendKind::RemoteCache => {
                let remote = &self.backend.remote_cache;
                require_non_empty(&remote.host, "backend.remote_cache.host")?;
                if remote.port == 0 {
                    return Err(invalid("port must be non-zero", "backend.remote_cache.port"));
                }
                if remote.database < 0 {
                    return Err(invalid(
                        "database index must not be negative",
                        "backend.remote_cache.database",
                    ));
                }
            }
        }

        crate::logging::parse_log_level(&self.logging.level)?;
        Ok(())
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn require_non_empty(value: &str, key: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid("value must not be empty", key));
    }
    Ok(())
}

fn invalid(message: &str, key: &str) -> QuickKvError {
    QuickKvError::ConfigError {
        message: format!("{key}: {message}"),
        config_key: Some(key.to_string()),
        source: None,
    }
}
