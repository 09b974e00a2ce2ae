//! In-memory response store

use statroute_core::Provider;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::CacheConfig;
use crate::key::compute_key;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    /// `None` when `now + ttl` is past the clock's range; never expires
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

#[derive(Debug)]
struct CacheInner<V> {
    map: HashMap<String, CacheEntry<V>>,
    last_sweep: Instant,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// Point-in-time cache counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Thread-safe response cache.
///
/// One coarse lock guards the whole map. Entries are visible only while
/// `now < expires_at`. Sweeps run on the calling thread: a routine sweep at
/// most once per `sweep_interval`, and a forced one whenever an insert takes
/// the map past `max_entries`.
#[derive(Debug)]
pub struct ResponseCache<V = serde_json::Value> {
    inner: Mutex<CacheInner<V>>,
    config: CacheConfig,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                map: HashMap::new(),
                last_sweep: Instant::now(),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheInner<V>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Live value for `key`
    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.lock();
        let now = Instant::now();
        self.maybe_sweep(&mut inner, now, false);

        let live = match inner.map.get(key) {
            Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
            _ => None,
        };
        if live.is_none() {
            inner.map.remove(key);
        }
        match live {
            Some(value) => {
                inner.hits += 1;
                tracing::debug!(key = %key, "Cache hit");
                Some(value)
            }
            None => {
                inner.misses += 1;
                tracing::debug!(key = %key, "Cache miss");
                None
            }
        }
    }

    /// Store `value` under `key` for `ttl`
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let mut inner = self.lock();
        let now = Instant::now();
        inner.map.insert(
            key.into(),
            CacheEntry {
                value,
                expires_at: now.checked_add(ttl),
            },
        );
        let over_capacity = inner.map.len() > self.config.max_entries;
        self.maybe_sweep(&mut inner, now, over_capacity);
    }

    pub fn cache_get(&self, provider: Provider, params: &serde_json::Value) -> Option<V> {
        self.get(&compute_key(provider, params))
    }

    pub fn cache_set(
        &self,
        provider: Provider,
        params: &serde_json::Value,
        value: V,
        ttl: Duration,
    ) {
        self.set(compute_key(provider, params), value, ttl);
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.lock().map.remove(key).map(|entry| entry.value)
    }

    pub fn clear(&self) {
        self.lock().map.clear();
    }

    /// Number of stored entries, expired ones included until the next sweep
    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            entries: inner.map.len(),
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
        }
    }

    /// Run a sweep now regardless of the interval; returns entries removed
    pub fn sweep(&self) -> usize {
        let mut inner = self.lock();
        let now = Instant::now();
        self.sweep_locked(&mut inner, now)
    }

    fn maybe_sweep(&self, inner: &mut CacheInner<V>, now: Instant, force: bool) {
        let due = now.saturating_duration_since(inner.last_sweep) >= self.config.sweep_interval();
        if due || force {
            self.sweep_locked(inner, now);
        }
    }

    fn sweep_locked(&self, inner: &mut CacheInner<V>, now: Instant) -> usize {
        inner.last_sweep = now;
        let before = inner.map.len();
        inner.map.retain(|_, entry| entry.is_live(now));
        let expired = before - inner.map.len();

        let mut evicted = 0;
        let len = inner.map.len();
        if len > self.config.max_entries {
            let fraction = (len as f64 * self.config.eviction_fraction).ceil() as usize;
            let count = fraction.max(len - self.config.max_entries).min(len);

            // Soonest-expiring first, entries that never expire last
            let mut by_expiry: Vec<(bool, Option<Instant>, String)> = inner
                .map
                .iter()
                .map(|(key, entry)| (entry.expires_at.is_none(), entry.expires_at, key.clone()))
                .collect();
            by_expiry.sort();
            for (_, _, key) in by_expiry.into_iter().take(count) {
                inner.map.remove(&key);
            }
            evicted = count;
            inner.evictions += count as u64;
        }

        if expired > 0 || evicted > 0 {
            tracing::debug!(
                expired,
                evicted,
                remaining = inner.map.len(),
                "Cache sweep"
            );
        }
        expired + evicted
    }
}

impl<V: Clone> Default for ResponseCache<V> {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn small_cache(max_entries: usize) -> ResponseCache<u32> {
        ResponseCache::new(CacheConfig {
            max_entries,
            ..CacheConfig::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_visible_until_ttl() {
        let cache: ResponseCache<&str> = ResponseCache::with_defaults();
        cache.set("k", "v", Duration::from_secs(1));
        assert_eq!(cache.get("k"), Some("v"));

        tokio::time::advance(Duration::from_millis(999)).await;
        assert_eq!(cache.get("k"), Some("v"));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_refreshes_ttl() {
        let cache = small_cache(10);
        cache.set("k", 1, Duration::from_secs(5));
        tokio::time::advance(Duration::from_secs(4)).await;
        cache.set("k", 2, Duration::from_secs(5));
        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(cache.get("k"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_routine_sweep_drops_expired() {
        let cache = small_cache(100);
        cache.set("short", 1, Duration::from_secs(10));
        cache.set("long", 2, Duration::from_secs(3600));
        assert_eq!(cache.len(), 2);

        // Expired but not yet swept
        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(cache.len(), 2);

        tokio::time::advance(Duration::from_secs(240)).await;
        assert_eq!(cache.get("long"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_over_capacity_evicts_soonest_expiring() {
        let cache = small_cache(10);
        for i in 0..10u32 {
            cache.set(format!("k{}", i), i, Duration::from_secs(100 + u64::from(i)));
        }
        assert_eq!(cache.len(), 10);

        // The 11th insert forces a sweep: max(ceil(11 * 0.1), 1) = 2 evicted
        cache.set("k10", 10, Duration::from_secs(1000));
        assert_eq!(cache.len(), 9);
        assert!(cache.get("k0").is_none());
        assert!(cache.get("k1").is_none());
        assert_eq!(cache.get("k2"), Some(2));
        assert_eq!(cache.get("k10"), Some(10));
        assert_eq!(cache.stats().evictions, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_ttl_never_expires() {
        let cache = small_cache(2);
        cache.set("forever", 1, Duration::from_secs(u64::MAX));
        cache.set("max", 2, Duration::MAX);
        assert_eq!(cache.get("forever"), Some(1));

        tokio::time::advance(Duration::from_secs(365 * 24 * 3600)).await;
        assert_eq!(cache.get("forever"), Some(1));
        assert_eq!(cache.get("max"), Some(2));

        // Over capacity, entries with a finite expiry go first
        cache.set("short", 3, Duration::from_secs(60));
        assert!(cache.get("short").is_none());
        assert_eq!(cache.get("forever"), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_size_bounded_after_sweep() {
        let cache = small_cache(50);
        for i in 0..500u32 {
            cache.set(format!("k{}", i), i, Duration::from_secs(600));
            assert!(cache.len() <= 50);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_keyed_helpers_and_stats() {
        let cache: ResponseCache = ResponseCache::with_defaults();
        let params = json!({"indicators": ["GDP"], "country": "US"});

        assert!(cache.cache_get(Provider::Fred, &params).is_none());
        cache.cache_set(Provider::Fred, &params, json!([1, 2, 3]), Duration::from_secs(60));
        assert_eq!(cache.cache_get(Provider::Fred, &params), Some(json!([1, 2, 3])));
        assert!(cache.cache_get(Provider::Imf, &params).is_none());

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_access() {
        let cache = std::sync::Arc::new(small_cache(1000));
        let handles: Vec<_> = (0..8u32)
            .map(|t| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    for i in 0..50u32 {
                        let key = format!("{}-{}", t, i);
                        cache.set(key.clone(), i, Duration::from_secs(60));
                        assert_eq!(cache.get(&key), Some(i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(cache.len(), 400);
    }
}
