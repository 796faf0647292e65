//! Typed rows of downloaded market tables.
//!
//! Field names follow the lowercased column headers of the exported CSVs
//! (`FlowDate` → `flowdate`, `MaxTransmissionLimitFrom` →
//! `maxtransmissionlimitfrom`, ...).

use serde::{Deserialize, Serialize};

use crate::io::lenient;

fn first_period() -> u32 {
    1
}

/// One zonal clearing price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZonalPrice {
    #[serde(default, rename(deserialize = "flowdate"), alias = "date")]
    pub flow_date: Option<String>,
    #[serde(deserialize_with = "lenient::u32_or_zero")]
    pub hour: u32,
    #[serde(default = "first_period", deserialize_with = "lenient::u32_or_zero")]
    pub period: u32,
    #[serde(alias = "zona")]
    pub zone: String,
    #[serde(deserialize_with = "lenient::f64_or_nan")]
    pub price: f64,
}

/// Scheduled flow between two zones in one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitFlow {
    pub from: String,
    pub to: String,
    #[serde(deserialize_with = "lenient::u32_or_zero")]
    pub hour: u32,
    #[serde(default = "first_period", deserialize_with = "lenient::u32_or_zero")]
    pub period: u32,
    /// Signed flow (MW).
    #[serde(deserialize_with = "lenient::f64_or_zero")]
    pub transit: f64,
}

/// Published transfer limits between two zones in one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransmissionLimit {
    pub from: String,
    pub to: String,
    #[serde(deserialize_with = "lenient::u32_or_zero")]
    pub hour: u32,
    #[serde(default = "first_period", deserialize_with = "lenient::u32_or_zero")]
    pub period: u32,
    /// Limit in the `from` → `to` direction (MW).
    #[serde(
        default,
        rename(deserialize = "maxtransmissionlimitfrom"),
        deserialize_with = "lenient::f64_or_zero"
    )]
    pub limit_from: f64,
    /// Limit in the `to` → `from` direction (MW).
    #[serde(
        default,
        rename(deserialize = "maxtransmissionlimitto"),
        deserialize_with = "lenient::f64_or_zero"
    )]
    pub limit_to: f64,
}

/// One row of ancillary-services (MSD) results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalancingResult {
    pub zone: String,
    #[serde(deserialize_with = "lenient::u32_or_zero")]
    pub hour: u32,
    #[serde(default = "first_period", deserialize_with = "lenient::u32_or_zero")]
    pub period: u32,
    /// Upward regulation volume (MWh).
    #[serde(
        default,
        rename(deserialize = "volumespurchased"),
        deserialize_with = "lenient::f64_or_zero"
    )]
    pub volumes_purchased: f64,
    /// Downward regulation volume (MWh).
    #[serde(
        default,
        rename(deserialize = "volumessold"),
        deserialize_with = "lenient::f64_or_zero"
    )]
    pub volumes_sold: f64,
    #[serde(
        default,
        rename(deserialize = "averagepurchasingprice"),
        deserialize_with = "lenient::opt_f64"
    )]
    pub average_purchasing_price: Option<f64>,
}

/// Session index within a day, 1-based: `(hour - 1) * 4 + period`.
pub fn session(hour: u32, period: u32) -> u32 {
    hour.saturating_sub(1) * 4 + period
}
