//! Key-value store facade
//!
//! [`Store`] validates keys and forwards to exactly one [`Backend`], chosen
//! at construction time. Validation happens before the backend is touched,
//! so an invalid key never reaches storage.

use crate::config::{BackendKind, Config};
use crate::error::{QuickKvError, Result};
use crate::key::validate_key;
use crate::storage::{
    Backend, DocumentBackend, MemoryBackend, RemoteCacheBackend, SearchCriteria, StoredValue, Ttl,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;

/// Expiration argument meaning "never expires"
pub const NEVER: i64 = -1;

/// Key-value store over a pluggable backend
pub struct Store {
    backend: Box<dyn Backend>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl Store {
    /// Create a store that owns `backend`
    pub fn new<B: Backend + 'static>(backend: B) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    /// Create a store over a fresh in-memory backend
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    /// Build the backend selected by `config.backend.kind`
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = match config.backend.kind {
            BackendKind::Memory => Self::in_memory(),
            BackendKind::Document => Self::new(DocumentBackend::connect(&config.backend.document)?),
            BackendKind::RemoteCache => {
                Self::new(RemoteCacheBackend::connect(&config.backend.remote_cache)?)
            }
        };
        info!(backend = store.backend_name(), "Store created");
        Ok(store)
    }

    /// Name of the backend in use
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Check whether a live entry exists.
    ///
    /// Backends that track expiry locally evict all expired entries first.
    pub fn contains(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        self.backend.contains(key)
    }

    /// Read a value. Missing and expired keys both fail with `KeyNotFound`.
    pub fn get(&self, key: &str) -> Result<StoredValue> {
        validate_key(key)?;
        let (value, _ttl) = self.backend.get(key)?;
        Ok(value)
    }

    /// Read a value, falling back to `default` when the key is missing or expired
    pub fn get_or(&self, key: &str, default: StoredValue) -> Result<StoredValue> {
        match self.get(key) {
            Err(QuickKvError::KeyNotFound { .. }) => Ok(default),
            other => other,
        }
    }

    /// Read and deserialize a value
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.get(key)?;
        serde_json::from_value(value)
            .map_err(|e| QuickKvError::serialization(format!("Cannot decode value of {key}"), e))
    }

    /// Remaining lifetime of a live entry
    pub fn ttl(&self, key: &str) -> Result<Ttl> {
        validate_key(key)?;
        let (_value, ttl) = self.backend.get(key)?;
        Ok(ttl)
    }

    /// Write a value that never expires
    pub fn insert(&self, key: &str, value: StoredValue) -> Result<()> {
        self.set(key, value, NEVER)
    }

    /// Write a value that expires `expires_in_seconds` from now.
    ///
    /// Zero or negative means never for the memory and document backends.
    /// The remote-cache backend treats zero as "expire immediately".
    pub fn set(&self, key: &str, value: StoredValue, expires_in_seconds: i64) -> Result<()> {
        validate_key(key)?;
        self.backend.set(key, value, expires_in_seconds)
    }

    /// Serialize and write a value
    pub fn set_serialized<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        expires_in_seconds: i64,
    ) -> Result<()> {
        let value = serde_json::to_value(value)
            .map_err(|e| QuickKvError::serialization(format!("Cannot encode value of {key}"), e))?;
        self.set(key, value, expires_in_seconds)
    }

    /// Remove a key. Removing a missing key is not an error.
    pub fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        self.backend.delete(key)
    }

    /// Re-schedule the expiration of an existing key, keeping its value
    pub fn expire(&self, key: &str, seconds: i64) -> Result<()> {
        validate_key(key)?;
        self.backend.expire(key, seconds)
    }

    /// Remove every expired entry now
    pub fn cleanup(&self) -> Result<()> {
        self.backend.cleanup()
    }

    /// Search by value; see [`SearchCriteria`]
    pub fn search(&self, criteria: &SearchCriteria) -> Result<HashMap<String, StoredValue>> {
        self.backend.search(criteria)
    }
}
