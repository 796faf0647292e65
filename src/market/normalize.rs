//! Normalization of heterogeneous market documents into price points.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::catalog::MarketType;

/// Zone used for electricity rows without one.
pub const NATIONAL_ZONE: &str = "National";

/// One normalized observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// `YYYY-MM-DD`; may be empty until filled from the request date.
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<u32>,
    pub price: f64,
    pub volume: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Normalizes a decoded document for the given market family.
///
/// Row lists are looked up under `Prices`, `Results`, `Data`, then the
/// first non-empty array field.
pub fn normalize(doc: &Value, market: MarketType) -> Vec<PricePoint> {
    match doc {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_object)
            .filter_map(|item| match market {
                MarketType::Electricity => electricity(item),
                MarketType::Gas => Some(gas(item)),
                MarketType::Environmental => Some(environmental(item)),
            })
            .collect(),
        Value::Object(map) => {
            for key in ["Prices", "Results", "Data"] {
                if let Some(inner @ Value::Array(_)) = map.get(key) {
                    return normalize(inner, market);
                }
            }
            map.values()
                .find(|v| v.as_array().is_some_and(|a| !a.is_empty()))
                .map(|inner| normalize(inner, market))
                .unwrap_or_default()
        }
        _ => Vec::new(),
    }
}

/// Electricity rows with neither price nor volume are dropped.
fn electricity(item: &Map<String, Value>) -> Option<PricePoint> {
    let price = nonzero(item, &["Price", "price"])
        .or_else(|| {
            nonzero(
                item,
                &[
                    "AveragePurchasingPrice",
                    "AverageSellingPrice",
                    "MinimumPurchasingPrice",
                    "MaximumSellingPrice",
                ],
            )
        })
        .unwrap_or(0.0);
    let purchased = number(item, &["VolumesPurchased", "Purchased"]).unwrap_or(0.0);
    let sold = number(item, &["VolumesSold", "Sold"]).unwrap_or(0.0);
    let volume = purchased.max(sold);
    if price == 0.0 && volume == 0.0 {
        return None;
    }

    let zone = text(item, &["Zone", "Zona"])
        .filter(|z| !z.is_empty())
        .unwrap_or_else(|| NATIONAL_ZONE.to_string());
    let interval = number(item, &["Hour", "hour", "interval"])
        .map_or(1, |h| h as u32)
        .max(1);

    Some(PricePoint {
        date: date(item, &["FlowDate", "date", "Date"]),
        interval: Some(interval),
        period: number(item, &["Period", "period"]).map(|p| p as u32),
        price,
        volume,
        zone: Some(zone),
        product: None,
        kind: None,
    })
}

fn gas(item: &Map<String, Value>) -> PricePoint {
    PricePoint {
        date: date(item, &["FlowDate", "date", "Date"]),
        interval: None,
        period: None,
        price: nonzero(item, &["AveragePrice", "WeightedAveragePrice", "Price"]).unwrap_or(0.0),
        volume: nonzero(item, &["MWhVolumes", "MWVolumes", "Volumes"]).unwrap_or(0.0),
        zone: None,
        product: text(item, &["Product"]),
        kind: None,
    }
}

fn environmental(item: &Map<String, Value>) -> PricePoint {
    PricePoint {
        date: date(item, &["Date", "FlowDate"]),
        interval: None,
        period: None,
        price: nonzero(item, &["ReferencePrice", "WeightedAveragePrice", "Price"]).unwrap_or(0.0),
        volume: nonzero(item, &["Volumes", "TradedVolumes"]).unwrap_or(0.0),
        zone: None,
        product: None,
        kind: text(item, &["Type"]),
    }
}

/// First of `keys` holding a number or numeric text.
fn number(item: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| as_number(item.get(*k)?))
}

/// First of `keys` holding a non-zero number.
fn nonzero(item: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .find_map(|k| as_number(item.get(*k)?).filter(|v| *v != 0.0))
}

fn as_number(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|x| x.is_finite())
}

fn text(item: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match item.get(*k)? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Dates as `YYYY-MM-DD`; compact `yyyyMMdd` forms are expanded.
fn date(item: &Map<String, Value>, keys: &[&str]) -> String {
    let Some(raw) = text(item, keys) else {
        return String::new();
    };
    if raw.len() == 8 && raw.bytes().all(|b| b.is_ascii_digit()) {
        format!("{}-{}-{}", &raw[0..4], &raw[4..6], &raw[6..8])
    } else {
        raw
    }
}
