//! Result cache for the DQL proxy
//!
//! # Features
//!
//! - **Fingerprint keys**: SHA-256 over a length-prefixed encoding of the query,
//!   time range and shaping parameters
//! - **TTL Support**: per-entry time-to-live, checked lazily on lookup
//! - **Thread-Safe**: `get` and `put` are each atomic under a `RwLock`
//! - **Statistics**: hits, misses, expirations and inserts
//!
//! The cache does not coordinate concurrent misses: two requests for the same
//! key that both miss will both execute upstream, and the later write wins.
//!
//! # Example
//!
//! ```ignore
//! use dql_cache::{build_key, CacheConfig, TtlCache};
//!
//! let cache = TtlCache::new(CacheConfig::default());
//! let key = build_key("table", &request, &[]);
//!
//! if let Some(result) = cache.get(&key) {
//!     return Ok(result);
//! }
//!
//! let result = client.execute_query(&request).await?;
//! cache.put_default(key, result.clone());
//! ```

pub mod cache;
pub mod config;
pub mod fingerprint;
pub mod stats;

pub use cache::TtlCache;
pub use config::CacheConfig;
pub use fingerprint::{build_key, CacheKey, Fingerprint};
pub use stats::CacheStats;
