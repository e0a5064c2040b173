use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Debug)]
struct CacheEntry<V> {
    value: Arc<V>,
    stored_at: Instant,
}

/// In-memory map whose entries are served for a fixed time after insertion.
///
/// Values are handed out as `Arc`s, so every read within the TTL returns the
/// very same allocation. Expired entries stay around until overwritten and
/// can still be read with [`TtlCache::get_stale`].
#[derive(Debug)]
pub struct TtlCache<V> {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
}

impl<V> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The cached value, if it is still within the TTL.
    pub async fn get(&self, key: &str) -> Option<Arc<V>> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|e| e.stored_at.elapsed() < self.ttl)
            .map(|e| Arc::clone(&e.value))
    }

    /// The cached value regardless of age.
    pub async fn get_stale(&self, key: &str) -> Option<Arc<V>> {
        let entries = self.entries.read().await;
        entries.get(key).map(|e| Arc::clone(&e.value))
    }

    pub async fn insert(&self, key: impl Into<String>, value: V) -> Arc<V> {
        let value = Arc::new(value);
        let entry = CacheEntry {
            value: Arc::clone(&value),
            stored_at: Instant::now(),
        };
        self.entries.write().await.insert(key.into(), entry);
        value
    }

    /// Returns the fresh entry or runs `fetch` and stores its result.
    ///
    /// A failed fetch leaves the existing (stale) entry untouched.
    pub async fn get_or_try_insert_with<F, Fut, E>(&self, key: &str, fetch: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(hit) = self.get(key).await {
            return Ok(hit);
        }
        let value = fetch().await?;
        Ok(self.insert(key, value).await)
    }

    pub async fn invalidate(&self, key: &str) {
        self.entries.write().await.remove(key);
    }
}
