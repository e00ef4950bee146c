//! Command Line Interface for quickkv
//!
//! Commands run directly against a [`Store`] built from configuration.
//! With the memory backend the data only lives for one invocation, so the
//! CLI is mostly useful against the document or remote-cache backends.

pub mod commands;

pub use commands::{Cli, Commands};

use crate::error::{QuickKvError, Result};
use crate::key::Key;
use crate::storage::{SearchCriteria, StoredValue};
use crate::store::{Store, NEVER};
use serde_json::Value;
use std::path::Path;
use tracing::debug;

/// Execute one command and render its result for the terminal
pub fn execute(store: &Store, command: Commands) -> Result<String> {
    debug!(command = ?command, backend = store.backend_name(), "Executing CLI command");

    match command {
        Commands::Set {
            key,
            value,
            expires,
        } => {
            store.set(&key, parse_value(&value), expires)?;
            Ok("OK".to_string())
        }
        Commands::Get { key } => match store.get(&key) {
            Ok(value) => Ok(value.to_string()),
            Err(QuickKvError::KeyNotFound { .. }) => Ok("(nil)".to_string()),
            Err(e) => Err(e),
        },
        Commands::Ttl { key } => match store.ttl(&key) {
            Ok(ttl) => Ok(ttl.to_string()),
            Err(QuickKvError::KeyNotFound { .. }) => Ok("(nil)".to_string()),
            Err(e) => Err(e),
        },
        Commands::Del { key } => {
            store.delete(&key)?;
            Ok("OK".to_string())
        }
        Commands::Exists { key } => Ok(store.contains(&key)?.to_string()),
        Commands::Expire { key, seconds } => {
            store.expire(&key, seconds)?;
            Ok("OK".to_string())
        }
        Commands::Cleanup => {
            store.cleanup()?;
            Ok("OK".to_string())
        }
        Commands::Search { values, fields } => {
            let criteria = fields.into_iter().fold(
                SearchCriteria::new().any_of(values.iter().map(|v| parse_value(v))),
                |criteria, (name, value)| criteria.field(name, parse_value(&value)),
            );
            let results = store.search(&criteria)?;
            format_search_results(results)
        }
        Commands::Import { file } => {
            let imported = import_file(store, &file)?;
            Ok(format!("Imported {imported} entries"))
        }
    }
}

/// JSON if it parses, otherwise the raw text as a string value
pub fn parse_value(raw: &str) -> StoredValue {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn format_search_results(
    results: std::collections::HashMap<String, StoredValue>,
) -> Result<String> {
    if results.is_empty() {
        return Ok("(empty)".to_string());
    }
    let ordered: std::collections::BTreeMap<_, _> = results.into_iter().collect();
    serde_json::to_string_pretty(&ordered)
        .map_err(|e| QuickKvError::serialization("Failed to render search results", e))
}

/// Load `[{"key": .., "value": .., "expires_in": ..}, ..]` into the store.
///
/// Stops at the first invalid entry; entries before it stay written.
pub fn import_file(store: &Store, path: &Path) -> Result<usize> {
    let raw = std::fs::read_to_string(path).map_err(|e| QuickKvError::InternalError {
        message: format!("Failed to read {}: {}", path.display(), e),
        component: Some("cli".to_string()),
        source: Some(Box::new(e)),
    })?;
    let entries: Vec<Value> = serde_json::from_str(&raw)
        .map_err(|e| QuickKvError::serialization("Import file must be a JSON array", e))?;

    for entry in &entries {
        let key = Key::try_from(entry.get("key").unwrap_or(&Value::Null))?;
        let value = entry.get("value").cloned().unwrap_or(Value::Null);
        let expires_in = entry
            .get("expires_in")
            .and_then(Value::as_i64)
            .unwrap_or(NEVER);
        store.set(key.as_str(), value, expires_in)?;
    }

    debug!(count = entries.len(), file = %path.display(), "Import complete");
    Ok(entries.len())
}
