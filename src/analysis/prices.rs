//! Maps zonal clearing prices onto the buses of a zonal network.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use super::{
    AnalysisError, NetworkBus, market_file, mean, opt_cell, read_network_buses, read_required,
};
use crate::grid::tables::DOMESTIC_ZONES;
use crate::market::records::ZonalPrice;

/// National single price label.
pub const PUN_ZONE: &str = "PUN";

/// Price assigned to one bus.
#[derive(Debug, Clone, PartialEq)]
pub struct BusPrice {
    pub bus_id: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// EUR/MWh; `None` when no zone or national price applies.
    pub price: Option<f64>,
    /// True when the national price stood in for a missing zonal one.
    pub from_pun: bool,
}

/// Mean price per zone over the periods of `hour`.
pub fn prices_for_hour(prices: &[ZonalPrice], hour: u32) -> BTreeMap<String, f64> {
    let mut by_zone: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for p in prices
        .iter()
        .filter(|p| p.hour == hour && p.price.is_finite())
    {
        by_zone
            .entry(p.zone.trim().to_string())
            .or_default()
            .push(p.price);
    }
    by_zone
        .into_iter()
        .filter_map(|(zone, values)| mean(values).map(|m| (zone, m)))
        .collect()
}

/// Assigns each bus the price of its zone.
///
/// Buses are matched to zones by id. Domestic zones without a price of
/// their own take the `PUN` price when one is present.
pub fn map_to_buses(zone_prices: &BTreeMap<String, f64>, buses: &[NetworkBus]) -> Vec<BusPrice> {
    let pun = zone_prices.get(PUN_ZONE).copied();
    buses
        .iter()
        .map(|b| {
            let id = b.bus_id.trim();
            let own = zone_prices.get(id).copied();
            let fallback = if own.is_none() && DOMESTIC_ZONES.contains(&id) {
                pun
            } else {
                None
            };
            BusPrice {
                bus_id: id.to_string(),
                lat: b.lat,
                lon: b.lon,
                price: own.or(fallback),
                from_pun: fallback.is_some(),
            }
        })
        .collect()
}

/// Writes bus prices as CSV.
///
/// # Errors
///
/// Returns a `csv::Error` if writing fails.
pub fn write_bus_prices(rows: &[BusPrice], writer: impl Write) -> Result<(), csv::Error> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(["bus_id", "lat", "lon", "price_eur_mwh", "source"])?;
    for r in rows {
        let source = match (r.price, r.from_pun) {
            (None, _) => "",
            (Some(_), true) => "pun",
            (Some(_), false) => "zonal",
        };
        wtr.write_record(&[
            r.bus_id.clone(),
            opt_cell(r.lat, 6),
            opt_cell(r.lon, 6),
            opt_cell(r.price, 2),
            source.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Maps one hour of `MGP_ME_ZonalPrices_{date}.csv` onto the buses in
/// `network_dir`.
///
/// # Errors
///
/// Returns an [`AnalysisError`] if the price table is missing or empty, or
/// the network bus table cannot be read.
pub fn analyze_hour(
    data_dir: &Path,
    network_dir: &Path,
    date: &str,
    hour: u32,
) -> Result<Vec<BusPrice>, AnalysisError> {
    let prices: Vec<ZonalPrice> =
        read_required(&market_file(data_dir, "MGP", "ME_ZonalPrices", date))?;
    let buses = read_network_buses(network_dir)?;
    let zone_prices = prices_for_hour(&prices, hour);
    if zone_prices.is_empty() {
        tracing::warn!(hour, "no prices for hour");
    }
    Ok(map_to_buses(&zone_prices, &buses))
}
