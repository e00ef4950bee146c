//! quickkv - a key-value store with per-entry expiration
//!
//! A [`Store`] validates keys and delegates to one of three interchangeable
//! backends: an in-process map ([`MemoryBackend`]), a MongoDB collection
//! ([`DocumentBackend`]) or a Redis server ([`RemoteCacheBackend`]).
//!
//! ```no_run
//! use quickkv::Store;
//! use serde_json::json;
//!
//! let store = Store::in_memory();
//! store.set("session:42", json!({"user": "a"}), 5)?;
//! assert_eq!(store.get("session:42")?, json!({"user": "a"}));
//! # Ok::<(), quickkv::QuickKvError>(())
//! ```

// Core modules
pub mod config;
pub mod error;
pub mod key;
pub mod logging;

// Feature modules
pub mod cli;
pub mod storage;
pub mod store;

// Public API exports
pub use config::{BackendKind, Config};
pub use error::{QuickKvError, Result};
pub use key::Key;
pub use store::{Store, NEVER};

// Test utilities (only available in test builds)
#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types
pub use storage::{
    Backend, Clock, DocumentBackend, Expiration, ManualClock, MemoryBackend, RemoteCacheBackend,
    SearchCriteria, StoredValue, SystemClock, Ttl,
};
