//! Grail DQL proxy for Grafana
//!
//! Serves `/table` and `/timeseries` in the shapes the Grafana Infinity data
//! source reads, plus a raw `/query` debug endpoint, `/health` and `/metrics`.

pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod server;

pub use config::{Config, ConfigArgs};
pub use error::ApiError;
pub use server::{router, run, AppState};
