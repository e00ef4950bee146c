//! CLI command definitions using clap

use crate::config::BackendKind;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// quickkv command-line client
#[derive(Debug, Parser)]
#[command(name = "quickkv-cli")]
#[command(about = "Inspect and edit a quickkv store")]
#[command(version)]
pub struct Cli {
    /// Configuration file (defaults to $QUICKKV_CONFIG or ./quickkv.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the configured backend
    #[arg(short, long, value_enum)]
    pub backend: Option<BackendKind>,

    /// Log at the configured level instead of warnings only
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Set a key; VALUE is parsed as JSON, falling back to a plain string
    Set {
        key: String,
        value: String,
        /// Seconds until expiry; zero or negative never expires
        #[arg(short, long, default_value_t = crate::store::NEVER, allow_negative_numbers = true)]
        expires: i64,
    },
    /// Get a value by key
    Get { key: String },
    /// Get time to live for a key
    Ttl { key: String },
    /// Delete a key
    Del { key: String },
    /// Check if a key exists
    Exists { key: String },
    /// Set expiration time for an existing key
    Expire {
        key: String,
        #[arg(allow_negative_numbers = true)]
        seconds: i64,
    },
    /// Remove all expired entries
    Cleanup,
    /// Search by value (VALUES) or by field (--field name=value)
    Search {
        values: Vec<String>,
        #[arg(short, long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },
    /// Import entries from a JSON array of {"key", "value", "expires_in"} objects
    Import { file: PathBuf },
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected name=value, got '{raw}'")),
    }
}
