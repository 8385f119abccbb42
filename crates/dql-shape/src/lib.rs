//! Response shapes for the Grafana Infinity data source
//!
//! Pure functions from a [`dql_core::RawResult`] to the JSON the dashboard
//! panels read.

pub mod table;
pub mod timeseries;

pub use table::{to_table, TableColumn, TableResponse};
pub use timeseries::{
    to_epoch_ms, to_timeseries, Frame, FrameField, TimeseriesParams, TimeseriesResponse,
};
