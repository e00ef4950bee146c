//! Test utilities for quickkv
//!
//! Shared helpers for tests that touch `QUICKKV_` environment variables.

use std::collections::HashMap;
use std::env;
use std::sync::Mutex;

/// Global mutex to ensure all config-related tests run serially
pub static GLOBAL_CONFIG_TEST_LOCK: Mutex<()> = Mutex::new(());

/// Remove all QUICKKV_ environment variables and return their values for restoration
pub fn clean_quickkv_env() -> HashMap<String, String> {
    let original_values: HashMap<String, String> = env::vars()
        .filter(|(key, _)| key.starts_with("QUICKKV_"))
        .collect();

    for key in original_values.keys() {
        env::remove_var(key);
    }

    original_values
}

/// Restore environment variables saved by [`clean_quickkv_env`]
pub fn restore_env(original_values: HashMap<String, String>) {
    for (key, _) in env::vars() {
        if key.starts_with("QUICKKV_") {
            env::remove_var(&key);
        }
    }

    for (key, value) in original_values {
        env::set_var(key, value);
    }
}
