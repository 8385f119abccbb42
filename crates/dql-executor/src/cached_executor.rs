//! Cached Query Executor
//!
//! Wraps the [`QueryClient`] with a TTL cache keyed by request fingerprint.

use crate::client::QueryClient;
use dql_cache::{CacheKey, TtlCache};
use dql_core::{QueryRequest, RawResult, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Serve `key` from the cache or run `execute` and cache what it returns.
///
/// Only successful results are stored; an error is handed back as-is and the
/// next call runs `execute` again.
pub async fn cache_lookup_or_execute<V, F, Fut>(
    cache: &TtlCache<V>,
    key: &CacheKey,
    ttl: Duration,
    execute: F,
) -> Result<V>
where
    V: Clone,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V>>,
{
    if let Some(hit) = cache.get(key) {
        debug!("Cache hit for {}", key);
        return Ok(hit);
    }

    debug!("Cache miss for {}, executing", key);
    let value = execute().await?;
    cache.put(key.clone(), value.clone(), ttl);
    Ok(value)
}

/// A query client with a shared result cache
pub struct CachedQueryExecutor {
    client: Arc<QueryClient>,
    cache: Arc<TtlCache<RawResult>>,
}

impl CachedQueryExecutor {
    pub fn new(client: Arc<QueryClient>, cache: Arc<TtlCache<RawResult>>) -> Self {
        Self { client, cache }
    }

    /// Execute a query, reusing a live cached result for `key`.
    pub async fn execute_cached(
        &self,
        key: &CacheKey,
        ttl: Duration,
        request: &QueryRequest,
    ) -> Result<RawResult> {
        cache_lookup_or_execute(&self.cache, key, ttl, || self.execute_uncached(request)).await
    }

    /// Execute without touching the cache.
    pub async fn execute_uncached(&self, request: &QueryRequest) -> Result<RawResult> {
        self.client.execute_query(request).await.map_err(|e| {
            warn!("Query failed ({}): {}", e.kind(), e);
            e
        })
    }

    /// Default TTL from the cache configuration
    pub fn default_ttl(&self) -> Duration {
        self.cache.config().default_ttl
    }

    /// Backing cache, shared with whoever reports on it
    pub fn cache(&self) -> &Arc<TtlCache<RawResult>> {
        &self.cache
    }
}
