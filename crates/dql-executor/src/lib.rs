//! Query execution against the Grail query API
//!
//! The engine runs queries asynchronously: a submit call returns a job id (or,
//! for quick queries, the result itself) and the job is polled until it
//! succeeds, fails or the configured timeout passes.
//!
//! # Example
//!
//! ```ignore
//! use dql_executor::{QueryClient, QueryClientConfig};
//! use dql_core::QueryRequest;
//!
//! let config = QueryClientConfig::new("https://abc123.live.dynatrace.com", token);
//! let client = QueryClient::from_config(&config)?;
//!
//! let request = QueryRequest::new("fetch logs | limit 10", "now()-1h", "now()")?;
//! let result = client.execute_query(&request).await?;
//! println!("{} rows", result.row_count());
//! ```

pub mod cached_executor;
pub mod client;
pub mod transport;

#[cfg(test)]
mod testing;

pub use cached_executor::{cache_lookup_or_execute, CachedQueryExecutor};
pub use client::{PollPolicy, QueryClient, QueryClientConfig};
pub use transport::{HttpTransport, Transport};
