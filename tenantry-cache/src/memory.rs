//! In-process cache backend.

use crate::error::CacheResult;
use crate::traits::CacheStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

/// Entry limit of [`InMemoryCache::new`].
pub const DEFAULT_MAX_ENTRIES: usize = 100_000;

/// Writes between two sweeps of expired entries.
const SWEEP_INTERVAL: usize = 256;

#[derive(Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|exp| exp > now)
    }
}

/// In-memory cache with per-key expiry and a bounded number of entries.
///
/// Expiry follows `tokio::time`, so paused-clock tests can advance past a TTL
/// without sleeping. Expired entries are dropped when read and swept
/// periodically on writes. When the cache is full, the entry closest to
/// expiry makes room for the new one.
#[derive(Clone)]
pub struct InMemoryCache {
    data: Arc<RwLock<HashMap<String, CacheEntry>>>,
    max_entries: usize,
    writes: Arc<AtomicUsize>,
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }
}

impl InMemoryCache {
    /// Create new in-memory cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache holding at most `max_entries` keys (at least one).
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
            max_entries: max_entries.max(1),
            writes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Drop expired entries, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut data = self.data.write().await;
        sweep(&mut data, Instant::now())
    }

    /// Number of stored entries, expired ones included until swept.
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn sweep(data: &mut HashMap<String, CacheEntry>, now: Instant) -> usize {
    let before = data.len();
    data.retain(|_, entry| entry.is_live(now));
    before - data.len()
}

/// Remove the entry that expires first; entries without expiry go last.
fn evict_one(data: &mut HashMap<String, CacheEntry>) {
    let victim = data
        .iter()
        .min_by_key(|(_, entry)| (entry.expires_at.is_none(), entry.expires_at))
        .map(|(key, _)| key.clone());

    if let Some(key) = victim {
        debug!(key = %key, "Cache full, evicting entry");
        data.remove(&key);
    }
}

#[async_trait]
impl CacheStore for InMemoryCache {
    async fn fetch(&self, key: &str) -> CacheResult<Option<String>> {
        let now = Instant::now();
        {
            let data = self.data.read().await;
            match data.get(key) {
                None => return Ok(None),
                Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        let mut data = self.data.write().await;
        if data.get(key).is_some_and(|entry| !entry.is_live(now)) {
            data.remove(key);
        }
        Ok(None)
    }

    async fn put(&self, key: &str, value: String, ttl: Option<Duration>) -> CacheResult<()> {
        let now = Instant::now();
        // A TTL past the clock's range never expires.
        let expires_at = ttl.and_then(|d| now.checked_add(d));
        let entry = CacheEntry { value, expires_at };

        let mut data = self.data.write().await;
        if (self.writes.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_INTERVAL == 0 {
            sweep(&mut data, now);
        }
        if !data.contains_key(key) && data.len() >= self.max_entries {
            sweep(&mut data, now);
            if data.len() >= self.max_entries {
                evict_one(&mut data);
            }
        }
        data.insert(key.to_string(), entry);
        Ok(())
    }

    async fn forget(&self, key: &str) -> CacheResult<bool> {
        let removed = self.data.write().await.remove(key);
        Ok(removed.is_some_and(|entry| entry.is_live(Instant::now())))
    }

    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>> {
        let data = self.data.read().await;
        let now = Instant::now();
        Ok(data
            .get(key)
            .and_then(|entry| entry.expires_at)
            .filter(|exp| *exp > now)
            .map(|exp| exp - now))
    }

    async fn flush_prefix(&self, prefix: &str) -> CacheResult<usize> {
        let mut data = self.data.write().await;
        let before = data.len();
        data.retain(|key, _| !key.starts_with(prefix));
        Ok(before - data.len())
    }
}
