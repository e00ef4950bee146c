//! Structured logging setup
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` built from
//! [`LoggingConfig::level`] (`RUST_LOG` still wins) and one formatting layer
//! chosen by [`LoggingConfig::format`], writing to stdout or to a file.

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{QuickKvError, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::{Layered, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

type BoxedLayer = Box<dyn Layer<Layered<EnvFilter, Registry>> + Send + Sync>;

/// Logging system manager
#[derive(Debug)]
pub struct LoggingSystem {
    config: LoggingConfig,
}

impl LoggingSystem {
    pub fn new(config: LoggingConfig) -> Self {
        Self { config }
    }

    /// Install the global subscriber.
    ///
    /// A subscriber that is already installed is kept and a warning is logged.
    pub fn initialize(&self) -> Result<()> {
        let log_level = parse_log_level(&self.config.level)?;
        let env_filter = EnvFilter::builder()
            .with_default_directive(log_level.into())
            .from_env_lossy();

        let layer = match &self.config.file_path {
            Some(path) => self.file_layer(path)?,
            None => self.console_layer(),
        };

        if let Err(e) = Registry::default().with(env_filter).with(layer).try_init() {
            warn!(
                "Failed to initialize tracing subscriber (may already be set): {}",
                e
            );
        }

        info!(
            level = %self.config.level,
            format = ?self.config.format,
            "Logging system initialized"
        );
        Ok(())
    }

    fn console_layer(&self) -> BoxedLayer {
        match self.config.format {
            LogFormat::Json => fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(true)
                .with_timer(ChronoUtc::rfc_3339())
                .with_target(true)
                .boxed(),
            LogFormat::Pretty => fmt::layer()
                .pretty()
                .with_timer(ChronoUtc::rfc_3339())
                .with_target(true)
                .with_file(false)
                .with_line_number(false)
                .boxed(),
            LogFormat::Compact => fmt::layer()
                .compact()
                .with_timer(ChronoUtc::rfc_3339())
                .with_target(false)
                .boxed(),
        }
    }

    fn file_layer(&self, file_path: &Path) -> Result<BoxedLayer> {
        if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| QuickKvError::InternalError {
                message: format!("Failed to create log directory: {}", e),
                component: Some("logging".to_string()),
                source: Some(Box::new(e)),
            })?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)
            .map_err(|e| QuickKvError::InternalError {
                message: format!("Failed to open log file: {}", e),
                component: Some("logging".to_string()),
                source: Some(Box::new(e)),
            })?;
        let writer = Arc::new(file);

        let layer = match self.config.format {
            LogFormat::Json => fmt::layer()
                .json()
                .with_writer(writer)
                .with_current_span(false)
                .with_span_list(true)
                .with_timer(ChronoUtc::rfc_3339())
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .boxed(),
            LogFormat::Pretty => fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_timer(ChronoUtc::rfc_3339())
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .boxed(),
            LogFormat::Compact => fmt::layer()
                .compact()
                .with_writer(writer)
                .with_ansi(false)
                .with_timer(ChronoUtc::rfc_3339())
                .with_target(true)
                .boxed(),
        };
        Ok(layer)
    }
}

/// Parse a log level name, case-insensitively
pub fn parse_log_level(level_str: &str) -> Result<Level> {
    match level_str.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(QuickKvError::ConfigError {
            message: format!("Invalid log level: {}", level_str),
            config_key: Some("logging.level".to_string()),
            source: None,
        }),
    }
}
