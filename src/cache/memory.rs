//! L1 in-memory LRU cache with TTL (spec §4.5, §3 `CacheEntry<V>`).
//!
//! Mirrors the teacher's `LruCache<LocationKey, ForecastBundle>` in
//! `app/state.rs`, generalized to carry expiry and a single-flight lock
//! per key so concurrent requests for the same key join one fetch
//! (spec §5 "at most one in-flight external fetch per key").

use std::collections::HashMap;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lru::LruCache;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub inserted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    #[must_use]
    pub fn new(value: V, ttl: chrono::Duration) -> Self {
        let now = Utc::now();
        Self {
            value,
            inserted_at: now,
            expires_at: now + ttl,
            last_accessed: now,
        }
    }

    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl MemoryCacheStats {
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// A TTL-bounded LRU cache safe for concurrent readers and a single
/// writer per key. The in-flight map provides single-flight semantics:
/// concurrent misses for the same key await the same fetch rather than
/// issuing duplicate upstream calls.
pub struct MemoryCache<K, V> {
    inner: Mutex<LruCache<K, CacheEntry<V>>>,
    in_flight: Mutex<HashMap<K, Arc<tokio::sync::Notify>>>,
    ttl: chrono::Duration,
    stats: Mutex<MemoryCacheStats>,
}

impl<K, V> MemoryCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    #[must_use]
    pub fn new(capacity: usize, ttl_secs: u64) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            in_flight: Mutex::new(HashMap::new()),
            ttl: chrono::Duration::seconds(ttl_secs as i64),
            stats: Mutex::new(MemoryCacheStats::default()),
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let now = Utc::now();
        let mut guard = self.inner.lock().await;
        let hit = match guard.get_mut(key) {
            Some(entry) if !entry.is_expired_at(now) => {
                entry.last_accessed = now;
                Some(entry.value.clone())
            }
            Some(_) => {
                guard.pop(key);
                None
            }
            None => None,
        };
        drop(guard);
        let mut stats = self.stats.lock().await;
        if hit.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        hit
    }

    pub async fn insert(&self, key: K, value: V) {
        let mut guard = self.inner.lock().await;
        let evicted = guard.put(key, CacheEntry::new(value, self.ttl));
        drop(guard);
        if evicted.is_some() {
            let mut stats = self.stats.lock().await;
            stats.evictions += 1;
        }
    }

    /// Evict half the least-recently-used entries, for the memory
    /// pressure policy in spec §5.
    pub async fn evict_half(&self) {
        let mut guard = self.inner.lock().await;
        let target = guard.len() / 2;
        for _ in 0..target {
            guard.pop_lru();
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Empties the cache entirely (spec §4.4 `refresh_cache`).
    pub async fn clear(&self) {
        self.inner.lock().await.clear();
    }

    pub async fn stats(&self) -> MemoryCacheStats {
        *self.stats.lock().await
    }

    /// Run `fetch` for `key`, ensuring only one caller across concurrent
    /// callers actually invokes it; others await the same result. On
    /// success the computed value is inserted into the cache.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<V, E>>,
    {
        if let Some(hit) = self.get(&key).await {
            return Ok(hit);
        }

        let mut in_flight = self.in_flight.lock().await;
        if let Some(existing) = in_flight.get(&key) {
            // Register as a waiter on the leader's `Notify` *before*
            // releasing `in_flight`: `enable()` marks this `Notified`
            // future as waiting while the lock is still held, so the
            // leader's later `notify_waiters()` cannot fire in the gap
            // between dropping the lock and first polling the future
            // (spec §5 single-flight: waiters must receive the leader's
            // result, never hang).
            let notify = Arc::clone(existing);
            let notified = notify.notified();
            let mut notified = std::pin::pin!(notified);
            notified.as_mut().enable();
            drop(in_flight);
            notified.await;
            if let Some(hit) = self.get(&key).await {
                return Ok(hit);
            }
        } else {
            let notify = Arc::new(tokio::sync::Notify::new());
            in_flight.insert(key.clone(), Arc::clone(&notify));
            drop(in_flight);
        }

        let result = fetch().await;
        if let Ok(value) = &result {
            self.insert(key.clone(), value.clone()).await;
        }
        let mut in_flight = self.in_flight.lock().await;
        if let Some(notify) = in_flight.remove(&key) {
            notify.notify_waiters();
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn insert_then_get_is_a_hit_within_ttl() {
        let cache: MemoryCache<String, u32> = MemoryCache::new(10, 300);
        cache.insert("a".to_string(), 42).await;
        assert_eq!(cache.get(&"a".to_string()).await, Some(42));
        assert_eq!(cache.stats().await.hits, 1);
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss() {
        let cache: MemoryCache<String, u32> = MemoryCache::new(10, 0);
        cache.insert("a".to_string(), 42).await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert_eq!(cache.get(&"a".to_string()).await, None);
    }

    #[tokio::test]
    async fn evict_half_drops_least_recently_used() {
        let cache: MemoryCache<String, u32> = MemoryCache::new(10, 300);
        for i in 0..4 {
            cache.insert(format!("k{i}"), i).await;
        }
        assert_eq!(cache.len().await, 4);
        cache.evict_half().await;
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn single_flight_fetches_once_for_concurrent_callers() {
        let cache: Arc<MemoryCache<String, u32>> = Arc::new(MemoryCache::new(10, 300));
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch::<_, _, ()>("key".to_string(), || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                        Ok(7)
                    })
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(7));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
