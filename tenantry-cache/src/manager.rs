//! High-level cache manager with typed access.

use crate::error::{CacheError, CacheResult};
use crate::traits::CacheStore;
use serde::{Serialize, de::DeserializeOwned};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Typed, optionally namespaced view over a [`CacheStore`].
#[derive(Clone)]
pub struct CacheManager {
    store: Arc<dyn CacheStore>,
    prefix: String,
}

impl CacheManager {
    /// Create a new cache manager.
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            prefix: String::new(),
        }
    }

    /// Same store, with every key prefixed by `prefix` (used verbatim).
    pub fn namespace(&self, prefix: impl Into<String>) -> Self {
        Self {
            store: self.store.clone(),
            prefix: format!("{}{}", self.prefix, prefix.into()),
        }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Full key as written to the store.
    pub fn key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Get a typed value from the cache.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        let key = self.key(key);
        match self.store.fetch(&key).await? {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|source| CacheError::Decode { key, source }),
            None => Ok(None),
        }
    }

    /// Set a typed value in the cache.
    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        let key = self.key(key);
        let json = serde_json::to_string(value).map_err(|source| CacheError::Encode {
            key: key.clone(),
            source,
        })?;
        self.store.put(&key, json, ttl).await
    }

    /// Return the cached value for `key`, or run `producer`, cache its
    /// result for `ttl` and return it.
    ///
    /// Producer errors are returned as-is and nothing is cached.
    pub async fn remember<T, E, F, Fut>(&self, key: &str, ttl: Duration, producer: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get(key).await? {
            trace!(key = %self.key(key), "Cache hit");
            return Ok(value);
        }

        debug!(key = %self.key(key), "Cache miss");
        let value = producer().await?;
        self.set(key, &value, Some(ttl)).await?;
        Ok(value)
    }

    /// Remove a key. Returns whether a live entry was removed.
    pub async fn forget(&self, key: &str) -> CacheResult<bool> {
        self.store.forget(&self.key(key)).await
    }

    pub async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.store.has(&self.key(key)).await
    }

    /// Drop every key in this namespace.
    pub async fn flush(&self) -> CacheResult<usize> {
        let flushed = self.store.flush_prefix(&self.prefix).await?;
        debug!(prefix = %self.prefix, flushed, "Cache namespace flushed");
        Ok(flushed)
    }

    pub async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>> {
        self.store.ttl(&self.key(key)).await
    }
}
