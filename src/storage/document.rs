//! MongoDB document-store backend
//!
//! Each entry is one document:
//!
//! ```text
//! { _id: <key>, value: <value as sub-document>, expires: <epoch seconds | -1.0> }
//! ```
//!
//! Expiry is enforced by query: reads check the stored timestamp and
//! [`Backend::cleanup`] bulk-deletes documents whose timestamp is in the
//! past. The `-1.0` sentinel is excluded from that predicate.

use super::expiration::{compute_ttl, Clock, Expiration, SystemClock, Ttl};
use super::{redact_url, Backend, SearchCriteria, StoredValue};
use crate::config::DocumentStoreConfig;
use crate::error::{QuickKvError, Result};
use mongodb::bson::{self, doc, Bson, Document};
use mongodb::options::ReplaceOptions;
use mongodb::sync::{Client, Collection};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

const FIELD_ID: &str = "_id";
const FIELD_VALUE: &str = "value";
const FIELD_EXPIRES: &str = "expires";

/// Point and bulk operations the backend needs from a document collection
pub trait DocumentClient: Send + Sync {
    /// `db.collection` name, for logs
    fn namespace(&self) -> String;

    fn find_one(&self, filter: Document) -> Result<Option<Document>>;

    fn find(&self, filter: Document) -> Result<Vec<Document>>;

    /// Replace the matching document or insert `replacement`
    fn upsert_one(&self, filter: Document, replacement: Document) -> Result<()>;

    /// Apply `update` to the first match; returns the number of matched documents
    fn update_one(&self, filter: Document, update: Document) -> Result<u64>;

    fn delete_one(&self, filter: Document) -> Result<()>;

    /// Returns the number of deleted documents
    fn delete_many(&self, filter: Document) -> Result<u64>;
}

impl DocumentClient for Collection<Document> {
    fn namespace(&self) -> String {
        Collection::namespace(self).to_string()
    }

    fn find_one(&self, filter: Document) -> Result<Option<Document>> {
        Ok(Collection::find_one(self, filter, None)?)
    }

    fn find(&self, filter: Document) -> Result<Vec<Document>> {
        let documents = Collection::find(self, filter, None)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(documents)
    }

    fn upsert_one(&self, filter: Document, replacement: Document) -> Result<()> {
        let options = ReplaceOptions::builder().upsert(true).build();
        Collection::replace_one(self, filter, replacement, options)?;
        Ok(())
    }

    fn update_one(&self, filter: Document, update: Document) -> Result<u64> {
        let result = Collection::update_one(self, filter, update, None)?;
        Ok(result.matched_count)
    }

    fn delete_one(&self, filter: Document) -> Result<()> {
        Collection::delete_one(self, filter, None)?;
        Ok(())
    }

    fn delete_many(&self, filter: Document) -> Result<u64> {
        let result = Collection::delete_many(self, filter, None)?;
        Ok(result.deleted_count)
    }
}

/// Document-store backend over a single collection
pub struct DocumentBackend<C: DocumentClient = Collection<Document>> {
    collection: C,
    clock: Arc<dyn Clock>,
}

impl<C: DocumentClient> std::fmt::Debug for DocumentBackend<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentBackend")
            .field("collection", &self.collection.namespace())
            .field("clock", &self.clock)
            .finish()
    }
}

impl DocumentBackend {
    /// Connect using host and credentials from configuration
    pub fn connect(config: &DocumentStoreConfig) -> Result<Self> {
        let uri = connection_uri(config);
        let client = Client::with_uri_str(&uri)?;

        info!(
            uri = %redact_url(&uri),
            database = %config.database,
            collection = %config.collection,
            "Document store backend connected"
        );

        Ok(Self::with_client(&client, &config.database, &config.collection))
    }

    /// Use an existing client handle
    pub fn with_client(client: &Client, database: &str, collection: &str) -> Self {
        Self::with_collection(client.database(database).collection(collection))
    }
}

impl<C: DocumentClient> DocumentBackend<C> {
    pub fn with_collection(collection: C) -> Self {
        Self {
            collection,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn collection(&self) -> &C {
        &self.collection
    }

    fn key_filter(key: &str) -> Document {
        doc! { "_id": key }
    }
}

impl<C: DocumentClient> Backend for DocumentBackend<C> {
    fn name(&self) -> &'static str {
        "document"
    }

    fn get(&self, key: &str) -> Result<(StoredValue, Ttl)> {
        let document = self
            .collection
            .find_one(Self::key_filter(key))?
            .ok_or_else(|| QuickKvError::not_found(key))?;

        let ttl = compute_ttl(read_expiration(&document), self.clock.now());
        if ttl.is_expired() {
            self.collection.delete_one(Self::key_filter(key))?;
            debug!(key = key, "Deleted expired document on read");
            return Err(QuickKvError::not_found(key));
        }

        let value = document
            .get(FIELD_VALUE)
            .cloned()
            .unwrap_or(Bson::Null)
            .into_relaxed_extjson();
        Ok((value, ttl))
    }

    fn set(&self, key: &str, value: StoredValue, expires_in_seconds: i64) -> Result<()> {
        let expiration = Expiration::after_seconds(self.clock.now(), expires_in_seconds);
        let document = entry_document(key, &value, expiration)?;

        self.collection.upsert_one(Self::key_filter(key), document)?;
        trace!(key = key, expires_in_seconds, "Document upserted");
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.collection.delete_one(Self::key_filter(key))?;
        trace!(key = key, "Document deleted");
        Ok(())
    }

    /// Sweeps first, then looks the key up. A document whose timestamp is
    /// exactly `now` survives the strict `$lt` sweep but is already expired,
    /// so presence is decided by the live TTL, same as `get`.
    fn contains(&self, key: &str) -> Result<bool> {
        let now = self.clock.now();
        self.delete_expired(now)?;

        let live = self
            .collection
            .find_one(Self::key_filter(key))?
            .is_some_and(|document| !compute_ttl(read_expiration(&document), now).is_expired());
        Ok(live)
    }

    fn expire(&self, key: &str, seconds: i64) -> Result<()> {
        // Fails for missing keys and evicts expired ones
        self.get(key)?;

        let expiration = Expiration::after_seconds(self.clock.now(), seconds);
        let matched = self.collection.update_one(
            Self::key_filter(key),
            doc! { "$set": { "expires": expiration.to_timestamp() } },
        )?;

        if matched == 0 {
            return Err(QuickKvError::not_found(key));
        }
        trace!(key = key, seconds, "Document expiration re-armed");
        Ok(())
    }

    fn cleanup(&self) -> Result<()> {
        self.delete_expired(self.clock.now())
    }

    fn search(&self, criteria: &SearchCriteria) -> Result<HashMap<String, StoredValue>> {
        self.cleanup()?;

        let filter = search_filter(criteria)?;
        let mut results = HashMap::new();
        for document in self.collection.find(filter)? {
            let key = match document.get(FIELD_ID) {
                Some(Bson::String(key)) => key.clone(),
                other => {
                    warn!(id = ?other, "Skipping document with non-string _id");
                    continue;
                }
            };
            let value = document
                .get(FIELD_VALUE)
                .cloned()
                .unwrap_or(Bson::Null)
                .into_relaxed_extjson();
            results.insert(key, value);
        }

        debug!(matches = results.len(), "Document search complete");
        Ok(results)
    }
}

impl<C: DocumentClient> DocumentBackend<C> {
    fn delete_expired(&self, now: chrono::DateTime<chrono::Utc>) -> Result<()> {
        let now = Expiration::At(now).to_timestamp();
        let removed = self.collection.delete_many(cleanup_filter(now))?;
        debug!(removed, "Document cleanup complete");
        Ok(())
    }
}

/// `mongodb://[user:password@]host`
pub(crate) fn connection_uri(config: &DocumentStoreConfig) -> String {
    let auth = match config.user.as_deref().filter(|user| !user.is_empty()) {
        Some(user) => format!(
            "{}:{}@",
            urlencoding::encode(user),
            urlencoding::encode(config.password.as_deref().unwrap_or_default())
        ),
        None => String::new(),
    };
    format!("mongodb://{}{}", auth, config.host)
}

/// Documents with a real timestamp before `now`. The negative sentinel never matches.
pub(crate) fn cleanup_filter(now: f64) -> Document {
    doc! { "expires": { "$gte": 0.0, "$lt": now } }
}

pub(crate) fn search_filter(criteria: &SearchCriteria) -> Result<Document> {
    match criteria.values.as_slice() {
        [single] => {
            let value = to_bson(single)?;
            Ok(doc! { "value": value })
        }
        [] => {
            let mut filter = Document::new();
            for (name, value) in &criteria.fields {
                filter.insert(format!("{FIELD_VALUE}.{name}"), to_bson(value)?);
            }
            Ok(filter)
        }
        many => {
            let values = many.iter().map(to_bson).collect::<Result<Vec<_>>>()?;
            Ok(doc! { "value": { "$in": values } })
        }
    }
}

pub(crate) fn entry_document(
    key: &str,
    value: &StoredValue,
    expiration: Expiration,
) -> Result<Document> {
    let value = to_bson(value)?;
    Ok(doc! {
        "_id": key,
        "value": value,
        "expires": expiration.to_timestamp(),
    })
}

fn read_expiration(document: &Document) -> Expiration {
    match document.get(FIELD_EXPIRES) {
        Some(Bson::Double(ts)) => Expiration::from_timestamp(*ts),
        Some(Bson::Int32(ts)) => Expiration::from_timestamp(f64::from(*ts)),
        Some(Bson::Int64(ts)) => Expiration::from_timestamp(*ts as f64),
        _ => Expiration::Never,
    }
}

fn to_bson(value: &StoredValue) -> Result<Bson> {
    bson::to_bson(value)
        .map_err(|e| QuickKvError::serialization("Failed to encode value as BSON", e))
}
