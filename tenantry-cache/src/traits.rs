//! Backend seam for cached lookups.

use crate::error::CacheResult;
use async_trait::async_trait;
use std::time::Duration;

/// Storage behind [`CacheManager`](crate::CacheManager).
///
/// Values arrive already encoded; a store only keeps strings and expiry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Encoded value under `key`. Missing and expired keys are `None`.
    async fn fetch(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store `value`, expiring after `ttl` if one is given.
    async fn put(&self, key: &str, value: String, ttl: Option<Duration>) -> CacheResult<()>;

    /// Remove `key`. Returns whether a live entry was removed.
    async fn forget(&self, key: &str) -> CacheResult<bool>;

    async fn has(&self, key: &str) -> CacheResult<bool> {
        Ok(self.fetch(key).await?.is_some())
    }

    /// Time left before `key` expires; `None` if missing or permanent.
    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>>;

    /// Remove every key starting with `prefix`, returning how many went.
    async fn flush_prefix(&self, prefix: &str) -> CacheResult<usize>;
}
