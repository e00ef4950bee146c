//! In-process storage backend
//!
//! Entries live in a `HashMap` behind a single mutex. Every operation holds
//! the lock for its whole duration, so a cleanup sweep never interleaves
//! with a read or write. Nothing survives a restart.

use super::expiration::{compute_ttl, Clock, Expiration, SystemClock, Ttl};
use super::{Backend, SearchCriteria, StoredValue};
use crate::error::{QuickKvError, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Stored value with its expiration
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub value: StoredValue,
    pub expires_at: Expiration,
}

impl Entry {
    pub fn new(value: StoredValue, expires_at: Expiration) -> Self {
        Self { value, expires_at }
    }

    /// Create an entry that never expires
    pub fn persistent(value: StoredValue) -> Self {
        Self::new(value, Expiration::Never)
    }

    /// Remaining lifetime at `now`
    pub fn ttl(&self, now: DateTime<Utc>) -> Ttl {
        compute_ttl(self.expires_at, now)
    }
}

/// In-memory backend with locally computed TTL
#[derive(Debug)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryBackend {
    /// Create an empty backend using the system clock
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Create a backend pre-seeded with entries that never expire
    pub fn with_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, StoredValue)>,
        K: Into<String>,
    {
        let seeded = entries
            .into_iter()
            .map(|(key, value)| (key.into(), Entry::persistent(value)))
            .collect();
        Self {
            entries: Mutex::new(seeded),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Number of stored entries, expired ones included until they are swept
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// All stored keys (for debugging/admin purposes)
    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }

    /// Drop every entry whose TTL is neither never nor strictly positive.
    fn sweep(entries: &mut HashMap<String, Entry>, now: DateTime<Utc>) -> usize {
        let before = entries.len();
        entries.retain(|_, entry| !entry.ttl(now).is_expired());
        before - entries.len()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: &str) -> Result<(StoredValue, Ttl)> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        let ttl = match entries.get(key) {
            Some(entry) => entry.ttl(now),
            None => return Err(QuickKvError::not_found(key)),
        };

        if ttl.is_expired() {
            entries.remove(key);
            debug!(key = key, "Evicted expired key on read");
            return Err(QuickKvError::not_found(key));
        }

        match entries.get(key) {
            Some(entry) => Ok((entry.value.clone(), ttl)),
            None => Err(QuickKvError::not_found(key)),
        }
    }

    fn set(&self, key: &str, value: StoredValue, expires_in_seconds: i64) -> Result<()> {
        let expires_at = Expiration::after_seconds(self.clock.now(), expires_in_seconds);
        self.entries
            .lock()
            .insert(key.to_string(), Entry::new(value, expires_at));
        trace!(key = key, expires_in_seconds, "SET");
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        trace!(key = key, "DEL");
        Ok(())
    }

    fn contains(&self, key: &str) -> Result<bool> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let removed = Self::sweep(&mut entries, now);
        if removed > 0 {
            debug!(removed, "Swept expired keys before membership check");
        }
        Ok(entries.contains_key(key))
    }

    fn expire(&self, key: &str, seconds: i64) -> Result<()> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        let expired = match entries.get(key) {
            Some(entry) => entry.ttl(now).is_expired(),
            None => return Err(QuickKvError::not_found(key)),
        };
        if expired {
            entries.remove(key);
            debug!(key = key, "Evicted expired key on expire");
            return Err(QuickKvError::not_found(key));
        }

        if let Some(entry) = entries.get_mut(key) {
            entry.expires_at = Expiration::after_seconds(now, seconds);
        }
        trace!(key = key, seconds, "EXPIRE");
        Ok(())
    }

    fn cleanup(&self) -> Result<()> {
        let now = self.clock.now();
        let removed = Self::sweep(&mut self.entries.lock(), now);
        debug!(removed, "Memory cleanup complete");
        Ok(())
    }

    fn search(&self, _criteria: &SearchCriteria) -> Result<HashMap<String, StoredValue>> {
        Err(QuickKvError::UnsupportedOperation {
            operation: "search",
            backend: self.name(),
        })
    }
}
