//! Prometheus metrics for the `/metrics` endpoint
//!
//! Request counting happens in the handlers. Cache figures live in
//! [`CacheStats`] and are copied into the registry on every scrape.

use dql_cache::{CacheStats, TtlCache};
use parking_lot::Mutex;
use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    requests: IntCounter,
    cache: CacheMetrics,
    /// Serializes scrapes so counter catch-up is not applied twice
    scrape: Mutex<()>,
}

/// Registered separately so a proxy without an upstream reports no cache series.
struct CacheMetrics {
    registry: Registry,
    enabled: IntGauge,
    hits: IntCounter,
    misses: IntCounter,
    expirations: IntCounter,
    inserts: IntCounter,
    entries: IntGauge,
    hit_ratio: Gauge,
}

fn counter(registry: &Registry, name: &str, help: &str) -> prometheus::Result<IntCounter> {
    let counter = IntCounter::new(name, help)?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

fn int_gauge(registry: &Registry, name: &str, help: &str) -> prometheus::Result<IntGauge> {
    let gauge = IntGauge::new(name, help)?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

/// Advance a counter to an externally tracked total.
fn catch_up(counter: &IntCounter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}

impl CacheMetrics {
    fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        let hit_ratio = Gauge::new(
            "dql_proxy_cache_hit_ratio",
            "Share of cache lookups served from a live entry",
        )?;
        registry.register(Box::new(hit_ratio.clone()))?;

        Ok(Self {
            enabled: int_gauge(&registry, "dql_proxy_cache_enabled", "1 if results are cached")?,
            hits: counter(
                &registry,
                "dql_proxy_cache_hits_total",
                "Cache lookups served from a live entry",
            )?,
            misses: counter(
                &registry,
                "dql_proxy_cache_misses_total",
                "Cache lookups that went upstream",
            )?,
            expirations: counter(
                &registry,
                "dql_proxy_cache_expirations_total",
                "Entries dropped because their TTL had passed",
            )?,
            inserts: counter(
                &registry,
                "dql_proxy_cache_inserts_total",
                "Successful results stored",
            )?,
            entries: int_gauge(
                &registry,
                "dql_proxy_cache_entries",
                "Entries currently held, expired ones included",
            )?,
            hit_ratio,
            registry,
        })
    }

    fn observe(&self, enabled: bool, stats: &CacheStats) {
        self.enabled.set(i64::from(enabled));
        catch_up(&self.hits, stats.hits());
        catch_up(&self.misses, stats.misses());
        catch_up(&self.expirations, stats.expirations());
        catch_up(&self.inserts, stats.inserts());
        self.entries
            .set(i64::try_from(stats.entry_count()).unwrap_or(i64::MAX));
        self.hit_ratio.set(stats.hit_rate());
    }
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        let up = int_gauge(&registry, "dql_proxy_up", "1 if proxy is running")?;
        up.set(1);
        let requests = counter(
            &registry,
            "dql_proxy_requests_total",
            "Query requests received",
        )?;

        Ok(Self {
            registry,
            requests,
            cache: CacheMetrics::new()?,
            scrape: Mutex::new(()),
        })
    }

    pub fn record_request(&self) {
        self.requests.inc();
    }

    pub fn requests(&self) -> u64 {
        self.requests.get()
    }

    /// Text exposition of all metrics, cache series only when a cache is given.
    pub fn render<V: Clone>(&self, cache: Option<&TtlCache<V>>) -> prometheus::Result<String> {
        let _guard = self.scrape.lock();

        let mut families = self.registry.gather();
        if let Some(cache) = cache {
            self.cache.observe(cache.is_enabled(), &cache.stats());
            families.extend(self.cache.registry.gather());
        }

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("requests", &self.requests())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dql_cache::{CacheConfig, Fingerprint};
    use std::time::Duration;

    #[test]
    fn test_render_without_cache() {
        let metrics = Metrics::new().unwrap();
        metrics.record_request();

        let text = metrics.render::<u32>(None).unwrap();
        assert!(text.contains("# TYPE dql_proxy_up gauge\ndql_proxy_up 1\n"));
        assert!(text.contains("# TYPE dql_proxy_requests_total counter\n"));
        assert!(text.contains("dql_proxy_requests_total 1\n"));
        assert!(!text.contains("cache"));
    }

    #[test]
    fn test_render_with_cache() {
        let cache = TtlCache::new(CacheConfig::default());
        let key = Fingerprint::new("table").field("fetch logs").finish();
        let other = Fingerprint::new("table").field("fetch spans").finish();

        cache.get(&key);
        cache.put(key.clone(), 1u32, Duration::ZERO);
        cache.get(&key);
        cache.put(key.clone(), 2u32, Duration::from_secs(60));
        cache.get(&key);
        cache.get(&other);

        let metrics = Metrics::new().unwrap();
        let text = metrics.render(Some(&cache)).unwrap();
        assert!(text.contains("dql_proxy_cache_enabled 1\n"));
        assert!(text.contains("dql_proxy_cache_hits_total 1\n"));
        assert!(text.contains("dql_proxy_cache_misses_total 3\n"));
        assert!(text.contains("dql_proxy_cache_expirations_total 1\n"));
        assert!(text.contains("dql_proxy_cache_inserts_total 2\n"));
        assert!(text.contains("dql_proxy_cache_entries 1\n"));
        assert!(text.contains("dql_proxy_cache_hit_ratio 0.25\n"));
    }

    #[test]
    fn test_repeated_scrapes_do_not_double_count() {
        let cache = TtlCache::new(CacheConfig::disabled());
        let key = Fingerprint::new("table").field("fetch logs").finish();
        cache.put(key.clone(), 1u32, Duration::from_secs(60));

        let metrics = Metrics::new().unwrap();
        let first = metrics.render(Some(&cache)).unwrap();
        let second = metrics.render(Some(&cache)).unwrap();

        assert_eq!(first, second);
        assert!(second.contains("dql_proxy_cache_enabled 0\n"));
        assert!(second.contains("dql_proxy_cache_inserts_total 0\n"));
    }
}
