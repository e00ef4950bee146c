//! Redis remote-cache backend
//!
//! Values are stored JSON-encoded. Expiry is left entirely to the server:
//! `set` and `expire` issue `EXPIRE`, `get` asks the server for `TTL`, and
//! `cleanup` has nothing to do.

use super::expiration::Ttl;
use super::{redact_url, Backend, SearchCriteria, StoredValue};
use crate::config::RemoteCacheConfig;
use crate::error::{QuickKvError, Result};
use parking_lot::Mutex;
use redis::Commands;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, trace};

/// Commands the backend needs from a cache connection
pub trait CacheConnection: Send {
    fn get_raw(&mut self, key: &str) -> Result<Option<String>>;

    /// `SET`, which also clears any TTL on the key
    fn set_raw(&mut self, key: &str, data: &str) -> Result<()>;

    /// `EXPIRE`; false when the key does not exist
    fn expire_in(&mut self, key: &str, seconds: i64) -> Result<bool>;

    /// `PERSIST`
    fn persist_key(&mut self, key: &str) -> Result<()>;

    /// `TTL`: -2 for a missing key, -1 for no expiry
    fn ttl_seconds(&mut self, key: &str) -> Result<i64>;

    fn key_exists(&mut self, key: &str) -> Result<bool>;

    fn delete_key(&mut self, key: &str) -> Result<()>;
}

impl CacheConnection for redis::Connection {
    fn get_raw(&mut self, key: &str) -> Result<Option<String>> {
        let raw: Option<String> = Commands::get(self, key)?;
        Ok(raw)
    }

    fn set_raw(&mut self, key: &str, data: &str) -> Result<()> {
        let _: () = Commands::set(self, key, data)?;
        Ok(())
    }

    fn expire_in(&mut self, key: &str, seconds: i64) -> Result<bool> {
        let applied: bool = Commands::expire(self, key, seconds)?;
        Ok(applied)
    }

    fn persist_key(&mut self, key: &str) -> Result<()> {
        let _: () = Commands::persist(self, key)?;
        Ok(())
    }

    fn ttl_seconds(&mut self, key: &str) -> Result<i64> {
        let ttl: i64 = Commands::ttl(self, key)?;
        Ok(ttl)
    }

    fn key_exists(&mut self, key: &str) -> Result<bool> {
        let exists: bool = Commands::exists(self, key)?;
        Ok(exists)
    }

    fn delete_key(&mut self, key: &str) -> Result<()> {
        let _: () = Commands::del(self, key)?;
        Ok(())
    }
}

/// Remote-cache backend over a single connection
pub struct RemoteCacheBackend<C: CacheConnection = redis::Connection> {
    connection: Mutex<C>,
}

impl<C: CacheConnection> std::fmt::Debug for RemoteCacheBackend<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteCacheBackend")
            .field("connection", &std::any::type_name::<C>())
            .finish()
    }
}

impl RemoteCacheBackend {
    /// Connect using host, port, password and database index from configuration
    pub fn connect(config: &RemoteCacheConfig) -> Result<Self> {
        let url = connection_url(config);
        let client = redis::Client::open(url.as_str())?;
        let connection = client.get_connection()?;

        info!(url = %redact_url(&url), "Remote cache backend connected");

        Ok(Self::with_connection(connection))
    }
}

impl<C: CacheConnection> RemoteCacheBackend<C> {
    /// Use an existing connection handle
    pub fn with_connection(connection: C) -> Self {
        Self {
            connection: Mutex::new(connection),
        }
    }
}

impl<C: CacheConnection> Backend for RemoteCacheBackend<C> {
    fn name(&self) -> &'static str {
        "remote_cache"
    }

    fn get(&self, key: &str) -> Result<(StoredValue, Ttl)> {
        let mut conn = self.connection.lock();

        let raw = conn
            .get_raw(key)?
            .ok_or_else(|| QuickKvError::not_found(key))?;
        let value = decode_value(&raw)?;

        let server_ttl = conn.ttl_seconds(key)?;
        let ttl = ttl_from_server(server_ttl).ok_or_else(|| QuickKvError::not_found(key))?;

        trace!(key = key, ttl = %ttl, "GET");
        Ok((value, ttl))
    }

    /// Negative `expires_in_seconds` leaves the key without a TTL; zero
    /// makes the server expire it immediately.
    fn set(&self, key: &str, value: StoredValue, expires_in_seconds: i64) -> Result<()> {
        let data = encode_value(&value)?;
        let mut conn = self.connection.lock();

        conn.set_raw(key, &data)?;
        if expires_in_seconds >= 0 {
            conn.expire_in(key, expires_in_seconds)?;
        }

        trace!(key = key, expires_in_seconds, "SET");
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.connection.lock().delete_key(key)?;
        trace!(key = key, "DEL");
        Ok(())
    }

    fn contains(&self, key: &str) -> Result<bool> {
        self.connection.lock().key_exists(key)
    }

    /// Same convention as `set`: negative clears the TTL, zero expires now.
    fn expire(&self, key: &str, seconds: i64) -> Result<()> {
        let mut conn = self.connection.lock();

        if seconds < 0 {
            if !conn.key_exists(key)? {
                return Err(QuickKvError::not_found(key));
            }
            conn.persist_key(key)?;
        } else if !conn.expire_in(key, seconds)? {
            return Err(QuickKvError::not_found(key));
        }

        trace!(key = key, seconds, "EXPIRE");
        Ok(())
    }

    fn cleanup(&self) -> Result<()> {
        // The server expires keys on its own
        Ok(())
    }

    fn search(&self, _criteria: &SearchCriteria) -> Result<HashMap<String, StoredValue>> {
        Err(QuickKvError::UnsupportedOperation {
            operation: "search",
            backend: self.name(),
        })
    }
}

/// `redis://[:password@]host:port/db`
pub(crate) fn connection_url(config: &RemoteCacheConfig) -> String {
    let auth = match config.password.as_deref().filter(|pw| !pw.is_empty()) {
        Some(password) => format!(":{}@", urlencoding::encode(password)),
        None => String::new(),
    };
    format!(
        "redis://{}{}:{}/{}",
        auth, config.host, config.port, config.database
    )
}

/// Map a server `TTL` reply. `None` means the key does not exist.
pub(crate) fn ttl_from_server(seconds: i64) -> Option<Ttl> {
    match seconds {
        -2 => None,
        s if s < 0 => Some(Ttl::Never),
        s => Some(Ttl::Remaining(Duration::from_secs(s as u64))),
    }
}

fn encode_value(value: &StoredValue) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| QuickKvError::serialization("Failed to encode value as JSON", e))
}

fn decode_value(raw: &str) -> Result<StoredValue> {
    serde_json::from_str(raw)
        .map_err(|e| QuickKvError::serialization("Stored value is not valid JSON", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(password: Option<&str>) -> RemoteCacheConfig {
        RemoteCacheConfig {
            host: "cache.internal".to_string(),
            port: 6380,
            password: password.map(str::to_string),
            database: 2,
        }
    }

    #[test]
    fn test_connection_url() {
        assert_eq!(connection_url(&config(None)), "redis://cache.internal:6380/2");
        assert_eq!(
            connection_url(&config(Some(""))),
            "redis://cache.internal:6380/2"
        );
        assert_eq!(
            connection_url(&config(Some("p@ss word"))),
            "redis://:p%40ss%20word@cache.internal:6380/2"
        );
    }

    #[test]
    fn test_ttl_from_server() {
        assert_eq!(ttl_from_server(-2), None);
        assert_eq!(ttl_from_server(-1), Some(Ttl::Never));
        assert_eq!(
            ttl_from_server(42),
            Some(Ttl::Remaining(Duration::from_secs(42)))
        );
    }

    #[test]
    fn test_value_encoding() {
        let value = json!({"user": "a", "roles": ["admin"], "age": 3});
        let encoded = encode_value(&value).unwrap();
        assert_eq!(decode_value(&encoded).unwrap(), value);

        let err = decode_value("not json").unwrap_err();
        assert!(matches!(err, QuickKvError::SerializationError { .. }));
    }

    /// Key space with server-side expiry driven by a manual clock
    mod in_memory {
        use super::*;
        use crate::storage::{Clock, ManualClock};
        use chrono::{DateTime, Utc};
        use std::sync::Arc;

        #[derive(Debug)]
        struct FakeCache {
            clock: Arc<ManualClock>,
            entries: HashMap<String, (String, Option<DateTime<Utc>>)>,
        }

        impl FakeCache {
            fn purge(&mut self) -> DateTime<Utc> {
                let now = self.clock.now();
                self.entries
                    .retain(|_, (_, deadline)| deadline.map_or(true, |at| at > now));
                now
            }
        }

        impl CacheConnection for FakeCache {
            fn get_raw(&mut self, key: &str) -> Result<Option<String>> {
                self.purge();
                Ok(self.entries.get(key).map(|(data, _)| data.clone()))
            }

            fn set_raw(&mut self, key: &str, data: &str) -> Result<()> {
                self.entries.insert(key.to_string(), (data.to_string(), None));
                Ok(())
            }

            fn expire_in(&mut self, key: &str, seconds: i64) -> Result<bool> {
                let now = self.purge();
                let Some((_, deadline)) = self.entries.get_mut(key) else {
                    return Ok(false);
                };
                *deadline = Some(now + chrono::Duration::seconds(seconds));
                self.purge();
                Ok(true)
            }

            fn persist_key(&mut self, key: &str) -> Result<()> {
                self.purge();
                if let Some((_, deadline)) = self.entries.get_mut(key) {
                    *deadline = None;
                }
                Ok(())
            }

            fn ttl_seconds(&mut self, key: &str) -> Result<i64> {
                let now = self.purge();
                Ok(match self.entries.get(key) {
                    None => -2,
                    Some((_, None)) => -1,
                    Some((_, Some(at))) => (*at - now).num_seconds(),
                })
            }

            fn key_exists(&mut self, key: &str) -> Result<bool> {
                self.purge();
                Ok(self.entries.contains_key(key))
            }

            fn delete_key(&mut self, key: &str) -> Result<()> {
                self.entries.remove(key);
                Ok(())
            }
        }

        fn fake_backend() -> (RemoteCacheBackend<FakeCache>, Arc<ManualClock>) {
            let clock = Arc::new(ManualClock::starting_now());
            let cache = FakeCache {
                clock: Arc::clone(&clock),
                entries: HashMap::new(),
            };
            (RemoteCacheBackend::with_connection(cache), clock)
        }

        #[test]
        fn test_set_without_expiry() {
            let (backend, _clock) = fake_backend();
            backend.set("k", json!({"user": "a"}), -1).unwrap();

            assert_eq!(backend.get("k").unwrap(), (json!({"user": "a"}), Ttl::Never));
            assert!(backend.contains("k").unwrap());
        }

        #[test]
        fn test_server_ttl_expiry() {
            let (backend, clock) = fake_backend();
            backend.set("session:42", json!({"user": "a"}), 5).unwrap();
            assert_eq!(
                backend.get("session:42").unwrap().1,
                Ttl::Remaining(Duration::from_secs(5))
            );

            clock.advance(Duration::from_secs(6));
            assert!(backend.get("session:42").unwrap_err().is_not_found());
            assert!(!backend.contains("session:42").unwrap());
        }

        #[test]
        fn test_zero_expiry_is_immediate() {
            let (backend, _clock) = fake_backend();
            backend.set("k", json!(1), 0).unwrap();

            assert!(!backend.contains("k").unwrap());
            assert!(backend.get("k").unwrap_err().is_not_found());
        }

        #[test]
        fn test_overwrite_clears_ttl() {
            let (backend, _clock) = fake_backend();
            backend.set("k", json!(1), 30).unwrap();
            backend.set("k", json!(2), -1).unwrap();
            assert_eq!(backend.get("k").unwrap(), (json!(2), Ttl::Never));
        }

        #[test]
        fn test_expire() {
            let (backend, clock) = fake_backend();
            assert!(backend.expire("missing", 10).unwrap_err().is_not_found());
            assert!(backend.expire("missing", -1).unwrap_err().is_not_found());

            backend.set("k", json!("v"), 100).unwrap();
            backend.expire("k", -1).unwrap();
            assert_eq!(backend.get("k").unwrap().1, Ttl::Never);

            backend.expire("k", 50).unwrap();
            assert_eq!(
                backend.get("k").unwrap().1,
                Ttl::Remaining(Duration::from_secs(50))
            );

            clock.advance(Duration::from_secs(51));
            assert!(backend.expire("k", 10).unwrap_err().is_not_found());
        }

        #[test]
        fn test_delete_and_cleanup() {
            let (backend, _clock) = fake_backend();
            backend.set("k", json!(1), -1).unwrap();
            backend.cleanup().unwrap();
            assert!(backend.contains("k").unwrap());

            backend.delete("k").unwrap();
            backend.delete("k").unwrap();
            assert!(!backend.contains("k").unwrap());
        }

        #[test]
        fn test_search_unsupported() {
            let (backend, _clock) = fake_backend();
            backend.set("k", json!({"role": "admin"}), -1).unwrap();
            assert!(matches!(
                backend.search(&SearchCriteria::new().field("role", "admin")),
                Err(QuickKvError::UnsupportedOperation {
                    operation: "search",
                    backend: "remote_cache"
                })
            ));
        }
    }

    // Integration tests require a running Redis instance (behind test-services feature)
    #[cfg(feature = "test-services")]
    mod integration {
        use super::*;
        use tracing::warn;

        fn test_backend() -> Option<RemoteCacheBackend> {
            let url =
                std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
            let client = redis::Client::open(url.as_str()).ok()?;
            match client.get_connection() {
                Ok(connection) => Some(RemoteCacheBackend::with_connection(connection)),
                Err(e) => {
                    warn!("Skipping Redis test (not available): {}", e);
                    None
                }
            }
        }

        fn unique_key(prefix: &str) -> String {
            format!(
                "test:{}:{}",
                prefix,
                chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
            )
        }

        #[test]
        fn test_redis_crud_operations() {
            let Some(backend) = test_backend() else {
                return;
            };
            let key = unique_key("crud");

            backend.set(&key, json!({"user": "a"}), -1).unwrap();
            let (value, ttl) = backend.get(&key).unwrap();
            assert_eq!(value, json!({"user": "a"}));
            assert_eq!(ttl, Ttl::Never);
            assert!(backend.contains(&key).unwrap());

            backend.delete(&key).unwrap();
            backend.delete(&key).unwrap();
            assert!(backend.get(&key).unwrap_err().is_not_found());
        }

        #[test]
        fn test_redis_ttl_expiry() {
            let Some(backend) = test_backend() else {
                return;
            };
            let key = unique_key("ttl");

            backend.set(&key, json!("temporary"), 1).unwrap();
            let ttl = backend.get(&key).unwrap().1;
            assert!(ttl.remaining().unwrap() <= Duration::from_secs(1));

            std::thread::sleep(Duration::from_millis(1500));
            assert!(backend.get(&key).unwrap_err().is_not_found());
            assert!(!backend.contains(&key).unwrap());
        }

        #[test]
        fn test_redis_zero_expiry_is_immediate() {
            let Some(backend) = test_backend() else {
                return;
            };
            let key = unique_key("zero");

            backend.set(&key, json!(1), 0).unwrap();
            assert!(!backend.contains(&key).unwrap());
        }

        #[test]
        fn test_redis_expire() {
            let Some(backend) = test_backend() else {
                return;
            };
            let key = unique_key("expire");

            assert!(backend.expire(&key, 10).unwrap_err().is_not_found());

            backend.set(&key, json!(1), 100).unwrap();
            backend.expire(&key, -1).unwrap();
            assert_eq!(backend.get(&key).unwrap().1, Ttl::Never);

            backend.expire(&key, 50).unwrap();
            assert!(backend.get(&key).unwrap().1.remaining().unwrap() <= Duration::from_secs(50));
            backend.delete(&key).unwrap();
        }
    }
}
