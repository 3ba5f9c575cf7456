//! Session-scoped read cache with stale-while-revalidate semantics.
//!
//! The cache is a plain key/value store behind an explicit [`ReadCache`]
//! handle. Entries are replaced wholesale on every refresh and only leave the
//! store when the session ends ([`ReadCache::clear`]) or a schema bump purges
//! an obsolete prefix ([`ReadCache::migrate`]). Concurrent refreshes of the
//! same key are not coalesced: each one writes, the last write wins.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::AggregateFailure;

pub const CACHE_NAMESPACE: &str = "deck";

/// Host-provided session storage.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    fn remove(&self, key: &str);
    fn keys(&self) -> Vec<String>;
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    fn map(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.map().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        self.map().insert(key.into(), value);
    }

    fn remove(&self, key: &str) {
        self.map().remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.map().keys().cloned().collect()
    }
}

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub key: String,
    pub payload: T,
    /// Milliseconds since the unix epoch.
    pub fetched_at: i64,
}

impl<T> CacheEntry<T> {
    pub fn age_ms(&self, now: i64) -> i64 {
        now.saturating_sub(self.fetched_at)
    }

    pub fn is_fresh_at(&self, now: i64, ttl: Duration) -> bool {
        self.age_ms(now) <= i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Fetched from a node during this call.
    Live,
    /// Every endpoint failed; this is the last cached value.
    Stale,
}

#[derive(Debug, Clone)]
pub struct Served<T> {
    pub payload: T,
    pub fetched_at: i64,
    pub freshness: Freshness,
    /// Why a stale value is being served.
    pub failure: Option<AggregateFailure>,
}

/// Cached value to render now plus the refresh running behind it.
pub struct Swr<T> {
    pub cached: Option<CacheEntry<T>>,
    pub refresh: JoinHandle<Option<CacheEntry<T>>>,
}

#[derive(Clone)]
pub struct ReadCache {
    store: Arc<dyn CacheStore>,
    prefix: String,
}

impl ReadCache {
    pub fn new(store: Arc<dyn CacheStore>, schema_version: u32) -> Self {
        Self {
            store,
            prefix: format!("{CACHE_NAMESPACE}:v{schema_version}:"),
        }
    }

    pub fn in_memory(schema_version: u32) -> Self {
        Self::new(Arc::new(MemoryStore::default()), schema_version)
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }

    /// Whatever is stored under `key`, regardless of age.
    pub fn get<T>(&self, key: &str) -> Option<CacheEntry<T>>
    where
        T: DeserializeOwned,
    {
        let raw = self.store.get(&self.storage_key(key))?;
        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(err) => {
                debug!(key, %err, "ignoring undecodable cache entry");
                None
            }
        }
    }

    pub fn get_fresh<T>(&self, key: &str, ttl: Duration) -> Option<T>
    where
        T: DeserializeOwned,
    {
        self.get_fresh_at(key, ttl, now_ms())
    }

    pub fn get_fresh_at<T>(&self, key: &str, ttl: Duration, now: i64) -> Option<T>
    where
        T: DeserializeOwned,
    {
        self.get::<T>(key)
            .filter(|entry| entry.is_fresh_at(now, ttl))
            .map(|entry| entry.payload)
    }

    /// Overwrites `key` with `payload` stamped now. Null payloads are refused.
    pub fn set<T>(&self, key: &str, payload: &T) -> bool
    where
        T: Serialize,
    {
        self.put(key, payload, now_ms())
    }

    pub fn put<T>(&self, key: &str, payload: &T, fetched_at: i64) -> bool
    where
        T: Serialize,
    {
        let payload = match serde_json::to_value(payload) {
            Ok(Value::Null) => {
                warn!(key, "refusing to cache a null payload");
                return false;
            }
            Ok(payload) => payload,
            Err(err) => {
                warn!(key, %err, "payload is not serializable");
                return false;
            }
        };
        let entry = CacheEntry {
            key: key.to_owned(),
            payload,
            fetched_at,
        };
        match serde_json::to_string(&entry) {
            Ok(raw) => {
                self.store.set(&self.storage_key(key), raw);
                true
            }
            Err(err) => {
                warn!(key, %err, "cache entry is not serializable");
                false
            }
        }
    }

    pub fn remove(&self, key: &str) {
        self.store.remove(&self.storage_key(key));
    }

    /// One-time purge of keys written under an older schema version.
    pub fn migrate(&self) -> usize {
        let namespace = format!("{CACHE_NAMESPACE}:");
        let obsolete: Vec<_> = self
            .store
            .keys()
            .into_iter()
            .filter(|k| k.starts_with(&namespace) && !k.starts_with(&self.prefix))
            .collect();
        for key in &obsolete {
            self.store.remove(key);
        }
        if !obsolete.is_empty() {
            info!(purged = obsolete.len(), "purged cache entries of old schema");
        }
        obsolete.len()
    }

    /// Session end.
    pub fn clear(&self) -> usize {
        let keys: Vec<_> = self
            .store
            .keys()
            .into_iter()
            .filter(|k| k.starts_with(&self.prefix))
            .collect();
        for key in &keys {
            self.store.remove(key);
        }
        keys.len()
    }

    /// Runs `fetch` in the background and stores its result. A failed
    /// refresh leaves the existing entry untouched.
    pub fn revalidate<T, F>(&self, key: &str, fetch: F) -> JoinHandle<Option<CacheEntry<T>>>
    where
        T: Serialize + Send + 'static,
        F: Future<Output = Result<T, AggregateFailure>> + Send + 'static,
    {
        let cache = self.clone();
        let key = key.to_owned();
        tokio::spawn(async move {
            match fetch.await {
                Ok(payload) => {
                    let fetched_at = now_ms();
                    cache
                        .put(&key, &payload, fetched_at)
                        .then(|| CacheEntry {
                            key,
                            payload,
                            fetched_at,
                        })
                }
                Err(failure) => {
                    warn!(
                        key = key.as_str(),
                        %failure,
                        "background refresh failed, keeping cached entry"
                    );
                    None
                }
            }
        })
    }

    /// Stale-while-revalidate: hand back the cached entry (if any) at once and
    /// refresh unconditionally.
    pub fn swr<T, F>(&self, key: &str, fetch: F) -> Swr<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: Future<Output = Result<T, AggregateFailure>> + Send + 'static,
    {
        Swr {
            cached: self.get(key),
            refresh: self.revalidate(key, fetch),
        }
    }

    /// Fetches in the foreground; when every endpoint fails the cached value
    /// is served instead, marked [`Freshness::Stale`].
    pub async fn load<T, F>(&self, key: &str, fetch: F) -> Result<Served<T>, AggregateFailure>
    where
        T: Serialize + DeserializeOwned,
        F: Future<Output = Result<T, AggregateFailure>>,
    {
        match fetch.await {
            Ok(payload) => {
                let fetched_at = now_ms();
                self.put(key, &payload, fetched_at);
                Ok(Served {
                    payload,
                    fetched_at,
                    freshness: Freshness::Live,
                    failure: None,
                })
            }
            Err(failure) => match self.get::<T>(key) {
                Some(entry) => {
                    warn!(
                        key,
                        %failure,
                        age_ms = entry.age_ms(now_ms()),
                        "serving stale cache entry"
                    );
                    Ok(Served {
                        payload: entry.payload,
                        fetched_at: entry.fetched_at,
                        freshness: Freshness::Stale,
                        failure: Some(failure),
                    })
                }
                None => Err(failure),
            },
        }
    }
}
