//! API request and response bodies.

use serde::{Deserialize, Serialize};

use crate::forecast::{ForecastPoint, HistoryPoint};
use crate::market::normalize::PricePoint;
use crate::market::table::Record;

/// `POST /api/price-data` body. Every field is required; they are optional
/// here so that a missing one answers 400 rather than a rejection.
#[derive(Debug, Default, Deserialize)]
pub struct PriceDataRequest {
    /// `electricity`, `gas`, or `environmental`.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Market id from the catalog, e.g. `MGP`.
    #[serde(default)]
    pub market: Option<String>,
    /// `YYYY-MM-DD`, inclusive.
    #[serde(default)]
    pub start_date: Option<String>,
    /// `YYYY-MM-DD`, inclusive.
    #[serde(default)]
    pub end_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PriceDataResponse {
    pub data: Vec<PricePoint>,
    pub count: usize,
}

/// `POST /api/forecast` body.
#[derive(Debug, Default, Deserialize)]
pub struct ForecastRequest {
    #[serde(default)]
    pub history: Vec<HistoryPoint>,
    /// Days to forecast; defaults to 2.
    #[serde(default)]
    pub days: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ForecastResponse {
    pub forecast: Vec<ForecastPoint>,
    pub count: usize,
}

/// `POST /api/export` body.
#[derive(Debug, Default, Deserialize)]
pub struct ExportRequest {
    #[serde(default)]
    pub rows: Vec<Record>,
    /// Download name; a spreadsheet extension is replaced by `.csv`.
    #[serde(default)]
    pub filename: Option<String>,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
}
