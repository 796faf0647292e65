//! Toolkit for the Italian electricity market: grid aggregation, GME API
//! access, market analysis, and price forecasting.

pub mod analysis;
/// REST API (enabled with the `api` feature).
#[cfg(feature = "api")]
pub mod api;
pub mod config;
pub mod error;
pub mod forecast;
/// Spatial reduction of a transmission grid into an aggregated network.
pub mod grid;
pub mod io;
pub mod market;
