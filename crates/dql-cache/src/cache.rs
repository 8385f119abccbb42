//! TTL result cache implementation

use crate::config::CacheConfig;
use crate::fingerprint::CacheKey;
use crate::stats::CacheStats;
use dql_core::{Clock, SystemClock};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Entry stored in the cache
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) >= self.ttl
    }
}

/// Thread-safe in-process cache with per-entry TTL.
///
/// Expiry is lazy: an entry past its TTL is dropped by the `get` that finds
/// it, and nothing else ever removes entries. There is no entry limit, so a
/// stream of distinct keys grows the map until those keys are looked up
/// again after expiring.
pub struct TtlCache<V> {
    entries: RwLock<HashMap<CacheKey, CacheEntry<V>>>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    stats: Arc<CacheStats>,
}

impl<V: Clone> TtlCache<V> {
    /// Create a cache on the system clock
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a cache reading time from `clock`
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            config,
            clock,
            stats: Arc::new(CacheStats::new()),
        }
    }

    /// Create a cache with default configuration
    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    /// Check if caching is enabled
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Look up a live entry.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        if !self.config.enabled {
            return None;
        }

        let now = self.clock.now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if !entry.is_expired(now) => {
                    self.stats.record_hit();
                    return Some(entry.value.clone());
                }
                None => {
                    self.stats.record_miss();
                    return None;
                }
                Some(_) => {}
            }
        }

        // Expired: re-check under the write lock, a concurrent put may have refreshed it.
        let mut entries = self.entries.write();
        match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                self.stats.record_hit();
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                self.stats.record_expiration();
                self.stats.record_miss();
                self.stats.set_entry_count(entries.len() as u64);
                debug!("Cache entry {} expired", key);
                None
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    /// Store a value that stays valid for `ttl`, replacing any previous entry.
    pub fn put(&self, key: CacheKey, value: V, ttl: Duration) {
        if !self.config.enabled {
            return;
        }

        let entry = CacheEntry {
            value,
            stored_at: self.clock.now(),
            ttl,
        };

        let entry_count = {
            let mut entries = self.entries.write();
            entries.insert(key, entry);
            entries.len() as u64
        };

        self.stats.record_insert();
        self.stats.set_entry_count(entry_count);
    }

    /// Store a value under the configured default TTL.
    pub fn put_default(&self, key: CacheKey, value: V) {
        self.put(key, value, self.config.default_ttl);
    }

    /// Remove every entry
    pub fn clear(&self) {
        self.entries.write().clear();
        self.stats.set_entry_count(0);
    }

    /// Get cache statistics
    pub fn stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Get the configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

impl<V> std::fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("enabled", &self.config.enabled)
            .field("default_ttl", &self.config.default_ttl)
            .field("current_entries", &self.entries.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::Fingerprint;
    use dql_core::ManualClock;
    use std::thread;

    fn key(name: &str) -> CacheKey {
        Fingerprint::new("test").field(name).finish()
    }

    fn manual_cache() -> (Arc<ManualClock>, TtlCache<String>) {
        let clock = Arc::new(ManualClock::new());
        let cache = TtlCache::with_clock(CacheConfig::default(), clock.clone());
        (clock, cache)
    }

    #[test]
    fn test_cache_put_get() {
        let (_, cache) = manual_cache();
        cache.put(key("a"), "payload".to_string(), Duration::from_secs(10));

        assert_eq!(cache.get(&key("a")), Some("payload".to_string()));
        assert_eq!(cache.stats().hits(), 1);
    }

    #[test]
    fn test_cache_miss() {
        let (_, cache) = manual_cache();

        assert!(cache.get(&key("nonexistent")).is_none());
        assert_eq!(cache.stats().misses(), 1);
    }

    #[test]
    fn test_expiry_boundary() {
        let (clock, cache) = manual_cache();
        cache.put(key("a"), "v".to_string(), Duration::from_secs(1));

        clock.advance(Duration::from_millis(999));
        assert!(cache.get(&key("a")).is_some());

        // now - stored_at == ttl counts as expired
        clock.advance(Duration::from_millis(1));
        assert!(cache.get(&key("a")).is_none());
        assert_eq!(cache.stats().expirations(), 1);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_put_overwrites_and_resets_expiry() {
        let (clock, cache) = manual_cache();
        cache.put(key("a"), "old".to_string(), Duration::from_secs(5));

        clock.advance(Duration::from_secs(4));
        cache.put(key("a"), "new".to_string(), Duration::from_secs(5));

        clock.advance(Duration::from_secs(4));
        assert_eq!(cache.get(&key("a")), Some("new".to_string()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_per_entry_ttl() {
        let (clock, cache) = manual_cache();
        cache.put(key("short"), "s".to_string(), Duration::from_secs(1));
        cache.put(key("long"), "l".to_string(), Duration::from_secs(60));

        clock.advance(Duration::from_secs(2));
        assert!(cache.get(&key("short")).is_none());
        assert!(cache.get(&key("long")).is_some());
    }

    #[test]
    fn test_put_default_uses_config_ttl() {
        let clock = Arc::new(ManualClock::new());
        let config = CacheConfig::default().with_ttl(Duration::from_secs(3));
        let cache = TtlCache::with_clock(config, clock.clone());

        cache.put_default(key("a"), 1u32);
        clock.advance(Duration::from_secs(2));
        assert_eq!(cache.get(&key("a")), Some(1));
        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get(&key("a")), None);
    }

    #[test]
    fn test_expired_entries_stay_until_looked_up() {
        let (clock, cache) = manual_cache();
        for i in 0..5 {
            cache.put(key(&i.to_string()), i.to_string(), Duration::from_secs(1));
        }

        clock.advance(Duration::from_secs(10));
        assert_eq!(cache.len(), 5);

        cache.get(&key("0"));
        assert_eq!(cache.len(), 4);
    }

    #[test]
    fn test_cache_disabled() {
        let cache: TtlCache<String> = TtlCache::new(CacheConfig::disabled());

        cache.put(key("a"), "v".to_string(), Duration::from_secs(60));
        assert_eq!(cache.len(), 0);
        assert!(cache.get(&key("a")).is_none());
    }

    #[test]
    fn test_cache_clear() {
        let (_, cache) = manual_cache();
        for i in 0..10 {
            cache.put(key(&i.to_string()), i.to_string(), Duration::from_secs(60));
        }

        assert_eq!(cache.len(), 10);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().entry_count(), 0);
    }

    #[test]
    fn test_real_clock_expiration() {
        let cache = TtlCache::with_defaults();
        cache.put(key("a"), vec![1, 2, 3], Duration::from_millis(50));

        assert!(cache.get(&key("a")).is_some());

        thread::sleep(Duration::from_millis(100));

        assert!(cache.get(&key("a")).is_none());
    }

    #[test]
    fn test_concurrent_access() {
        let cache = Arc::new(TtlCache::with_defaults());
        let mut handles = vec![];

        for i in 0..10 {
            let cache_clone = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                let k = key(&i.to_string());
                cache_clone.put(k.clone(), i, Duration::from_secs(60));
                assert_eq!(cache_clone.get(&k), Some(i));
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 10);
    }

    #[test]
    fn test_concurrent_writers_same_key() {
        let cache = Arc::new(TtlCache::with_defaults());
        let k = key("shared");

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                let k = k.clone();
                thread::spawn(move || cache.put(k, vec![i; 16], Duration::from_secs(60)))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Last write wins; the value is never a mix of two writes.
        let value = cache.get(&k).unwrap();
        assert!(value.iter().all(|v| *v == value[0]));
        assert_eq!(cache.len(), 1);
    }
}
