//! Integration tests for configuration management
//!
//! These tests verify that configuration loads from files and the
//! environment and that a store can be built from the result.

use quickkv::config::{CONFIG_PATH_ENV, DEFAULT_CONFIG_FILE};
use quickkv::{BackendKind, Config, QuickKvError, Store};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::sync::Mutex;
use tempfile::TempDir;

// Global mutex to ensure all config-related tests run serially
// This prevents environment variable pollution between tests
static GLOBAL_CONFIG_TEST_LOCK: Mutex<()> = Mutex::new(());

/// Remove all QUICKKV_ environment variables and return the original values
fn clean_quickkv_env() -> HashMap<String, String> {
    let original_values: HashMap<String, String> = env::vars()
        .filter(|(key, _)| key.starts_with("QUICKKV_"))
        .collect();

    for key in original_values.keys() {
        env::remove_var(key);
    }

    original_values
}

/// Helper function to restore environment variables
fn restore_env(original_values: HashMap<String, String>) {
    for (key, _) in env::vars() {
        if key.starts_with("QUICKKV_") {
            env::remove_var(&key);
        }
    }

    for (key, value) in original_values {
        env::set_var(key, value);
    }
}

#[test]
fn test_default_config_builds_memory_store() {
    let _guard = GLOBAL_CONFIG_TEST_LOCK.lock().unwrap();
    let original_env = clean_quickkv_env();

    // No file at the default location in the test working directory
    assert!(!std::path::Path::new(DEFAULT_CONFIG_FILE).exists());
    let config = Config::load().unwrap();
    assert_eq!(config.backend.kind, BackendKind::Memory);

    let store = Store::from_config(&config).unwrap();
    assert_eq!(store.backend_name(), "memory");

    restore_env(original_env);
}

#[test]
fn test_config_file_named_by_environment() {
    let _guard = GLOBAL_CONFIG_TEST_LOCK.lock().unwrap();
    let original_env = clean_quickkv_env();

    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("custom.toml");
    fs::write(
        &config_path,
        r#"
[backend]
kind = "remote_cache"

[backend.remote_cache]
host = "cache.internal"
port = 6380
database = 2

[logging]
level = "debug"
format = "compact"
"#,
    )
    .unwrap();

    env::set_var(CONFIG_PATH_ENV, &config_path);
    // Environment wins over the file
    env::set_var("QUICKKV_BACKEND__REMOTE_CACHE__DATABASE", "5");

    let config = Config::load().unwrap();
    assert_eq!(config.backend.kind, BackendKind::RemoteCache);
    assert_eq!(config.backend.remote_cache.host, "cache.internal");
    assert_eq!(config.backend.remote_cache.port, 6380);
    assert_eq!(config.backend.remote_cache.database, 5);
    assert_eq!(config.logging.level, "debug");

    restore_env(original_env);
}

#[test]
fn test_invalid_environment_value_is_rejected() {
    let _guard = GLOBAL_CONFIG_TEST_LOCK.lock().unwrap();
    let original_env = clean_quickkv_env();

    env::set_var("QUICKKV_LOGGING__LEVEL", "shouting");
    assert!(matches!(
        Config::load(),
        Err(QuickKvError::ConfigError { .. })
    ));

    env::remove_var("QUICKKV_LOGGING__LEVEL");
    env::set_var("QUICKKV_BACKEND__KIND", "filesystem");
    assert!(Config::load().is_err());

    restore_env(original_env);
}

#[test]
fn test_document_config_round_trips_through_toml() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("document.toml");

    let mut config = Config::default();
    config.backend.kind = BackendKind::Document;
    config.backend.document.user = Some("app".to_string());
    config.backend.document.password = Some("p@ss:word".to_string());
    fs::write(&config_path, toml_for(&config)).unwrap();

    let loaded = Config::from_file(&config_path).unwrap();
    assert_eq!(loaded.backend.kind, BackendKind::Document);
    assert_eq!(loaded.backend.document, config.backend.document);
    assert_eq!(loaded.logging, config.logging);
}

fn toml_for(config: &Config) -> String {
    let document = &config.backend.document;
    format!(
        r#"
[backend]
kind = "document"

[backend.document]
host = "{}"
user = "{}"
password = "{}"
database = "{}"
collection = "{}"
"#,
        document.host,
        document.user.as_deref().unwrap_or_default(),
        document.password.as_deref().unwrap_or_default(),
        document.database,
        document.collection,
    )
}
