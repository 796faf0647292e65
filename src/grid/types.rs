//! Core grid types: raw topology records and the reduced network tables.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::io::lenient;

/// A point in lat/lon degrees.
///
/// Distances between coordinates are plain Euclidean distances in degree
/// space, with no projection correction.
///
/// # Examples
///
/// ```
/// use gme_grid::grid::types::Coord;
///
/// let a = Coord::new(45.0, 9.0);
/// let b = Coord::new(48.0, 13.0);
/// assert_eq!(a.distance(&b), 5.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lon: f64,
}

impl Coord {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Builds a coordinate from optional parts, rejecting missing or
    /// non-finite values.
    pub fn from_parts(lat: Option<f64>, lon: Option<f64>) -> Option<Self> {
        match (lat, lon) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => {
                Some(Self::new(lat, lon))
            }
            _ => None,
        }
    }

    /// Euclidean distance in degree space.
    pub fn distance(&self, other: &Coord) -> f64 {
        let dlat = self.lat - other.lat;
        let dlon = self.lon - other.lon;
        (dlat * dlat + dlon * dlon).sqrt()
    }
}

/// A raw substation from the detailed topology.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Substation {
    /// Source identifier (e.g. an OSM id).
    #[serde(alias = "osm_id", alias = "bus_id")]
    pub id: String,
    /// Nominal voltage (kV); `NaN` when unparsable.
    #[serde(alias = "voltage", deserialize_with = "lenient::f64_or_nan")]
    pub voltage_kv: f64,
    /// Latitude, if known.
    #[serde(default, alias = "y", deserialize_with = "lenient::opt_f64")]
    pub lat: Option<f64>,
    /// Longitude, if known.
    #[serde(default, alias = "x", deserialize_with = "lenient::opt_f64")]
    pub lon: Option<f64>,
    /// Optional human-readable name.
    #[serde(default)]
    pub name: Option<String>,
    /// Optional ISO country code (e.g. `IT`, `FR`).
    #[serde(default)]
    pub country: Option<String>,
}

impl Substation {
    /// Coordinate of the substation, if both parts are present and non-zero.
    ///
    /// A zero latitude or longitude marks a placeholder in the source data and
    /// is treated as missing.
    pub fn coord(&self) -> Option<Coord> {
        Coord::from_parts(self.lat, self.lon).filter(|c| c.lat != 0.0 && c.lon != 0.0)
    }
}

/// Line technology. HVDC links carry their own rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LineKind {
    #[serde(rename = "AC")]
    Ac,
    #[serde(rename = "DC")]
    Dc,
}

impl LineKind {
    /// Parses a free-text kind column; anything other than `DC` is AC.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(s) if s.eq_ignore_ascii_case("dc") => Self::Dc,
            _ => Self::Ac,
        }
    }
}

impl fmt::Display for LineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ac => write!(f, "AC"),
            Self::Dc => write!(f, "DC"),
        }
    }
}

/// A raw transmission line (or DC link).
///
/// Endpoints may be given as coordinates, as substation ids, or both.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransmissionLine {
    #[serde(alias = "osm_id", alias = "line_id", alias = "link_id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub lat_start: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub lon_start: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub lat_end: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub lon_end: Option<f64>,
    /// Substation id of the start endpoint.
    #[serde(default)]
    pub bus0: Option<String>,
    /// Substation id of the end endpoint.
    #[serde(default)]
    pub bus1: Option<String>,
    #[serde(alias = "voltage", deserialize_with = "lenient::f64_or_nan")]
    pub voltage_kv: f64,
    #[serde(default, alias = "length", deserialize_with = "lenient::f64_or_zero")]
    pub length_km: f64,
    /// Free-text circuit count (`"2"`, `"1;2"`, `"2.0"`, ...).
    #[serde(default)]
    pub circuits: Option<String>,
    /// `AC` or `DC`; missing means AC.
    #[serde(default, alias = "type", alias = "carrier")]
    pub kind: Option<String>,
    /// Rated power of DC links (MW).
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub p_nom: Option<f64>,
}

impl TransmissionLine {
    pub fn start(&self) -> Option<Coord> {
        Coord::from_parts(self.lat_start, self.lon_start)
    }

    pub fn end(&self) -> Option<Coord> {
        Coord::from_parts(self.lat_end, self.lon_end)
    }

    pub fn line_kind(&self) -> LineKind {
        LineKind::parse(self.kind.as_deref())
    }
}

/// A raw generation unit.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Generator {
    #[serde(alias = "osm_id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub lon: Option<f64>,
    /// Fuel type, e.g. `CCGT`, `hydro`, `solar`.
    #[serde(alias = "fuel", alias = "fuel_type")]
    pub carrier: String,
    /// Nameplate capacity (MW).
    #[serde(default, alias = "p_nom", deserialize_with = "lenient::f64_or_zero")]
    pub capacity_mw: f64,
    #[serde(default)]
    pub name: Option<String>,
}

impl Generator {
    pub fn coord(&self) -> Option<Coord> {
        Coord::from_parts(self.lat, self.lon)
    }
}

/// System-wide hourly demand.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DemandSeries {
    /// Timestamp labels, kept verbatim from the input index column.
    pub timestamps: Vec<String>,
    /// Demand per timestamp (MW).
    pub demand_mw: Vec<f64>,
}

impl DemandSeries {
    pub fn len(&self) -> usize {
        self.demand_mw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.demand_mw.is_empty()
    }
}

/// A reduced-order grid location representing many real substations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateNode {
    /// Bus identifier (`IT_00` for clusters, zone code for zonal runs).
    pub id: String,
    /// Centroid.
    pub coord: Coord,
    /// Number of member substations.
    pub n_substations: usize,
    /// Highest member voltage (kV); 0 for empty zones.
    pub max_voltage_kv: f64,
    /// Human-readable region or zone label.
    pub region: Option<String>,
}

/// Where an edge's `s_nom` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CapacityOrigin {
    /// Voltage-tier heuristic or summed DC rating.
    Estimated,
    /// Operator-published transmission limit.
    Measured,
}

impl fmt::Display for CapacityOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Estimated => write!(f, "estimated"),
            Self::Measured => write!(f, "measured"),
        }
    }
}

/// A logical connection between two distinct aggregate nodes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateEdge {
    /// `{bus0}_{bus1}`, with a `_DC` suffix for DC corridors.
    pub id: String,
    pub bus0: String,
    pub bus1: String,
    /// Max voltage among folded lines (kV).
    pub voltage_kv: f64,
    /// Mean length among folded lines (km).
    pub length_km: f64,
    /// Thermal transfer capacity (MW).
    pub s_nom: f64,
    /// Reactance (p.u.).
    pub x: f64,
    /// Number of raw lines folded into this edge.
    pub n_lines: usize,
    /// Sum of parsed circuit counts.
    pub total_circuits: f64,
    pub kind: LineKind,
    pub capacity_origin: CapacityOrigin,
}

/// Summed generation capacity for one (node, carrier) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateGenerator {
    /// `{bus}_{carrier}`.
    pub id: String,
    pub bus: String,
    pub carrier: String,
    /// Summed nameplate capacity (MW).
    pub p_nom: f64,
    /// Assumed dispatch cost (EUR/MWh).
    pub marginal_cost: f64,
    pub n_units: usize,
}

/// Demand split across aggregate nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadProfiles {
    /// Timestamp labels, one per row.
    pub timestamps: Vec<String>,
    /// Bus ids, one per column.
    pub bus_ids: Vec<String>,
    /// Per-bus share of system demand, summing to 1.
    pub weights: Vec<f64>,
    /// Hours × buses matrix (MW).
    pub rows: Vec<Vec<f64>>,
}

impl LoadProfiles {
    /// Largest system-wide hourly total (MW).
    pub fn peak_demand_mw(&self) -> f64 {
        self.rows
            .iter()
            .map(|row| row.iter().sum::<f64>())
            .fold(0.0, f64::max)
    }
}

/// One-row run summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkSummary {
    pub n_buses: usize,
    pub n_lines: usize,
    pub n_generators: usize,
    pub total_gen_capacity_mw: f64,
    pub total_line_capacity_mw: f64,
    pub peak_demand_mw: f64,
}

impl fmt::Display for NetworkSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Network Summary ---")?;
        writeln!(f, "Buses:                {}", self.n_buses)?;
        writeln!(f, "Lines:                {}", self.n_lines)?;
        writeln!(f, "Generators:           {}", self.n_generators)?;
        writeln!(
            f,
            "Total gen capacity:   {:.0} MW",
            self.total_gen_capacity_mw
        )?;
        writeln!(
            f,
            "Total line capacity:  {:.0} MW",
            self.total_line_capacity_mw
        )?;
        write!(f, "Peak demand:          {:.0} MW", self.peak_demand_mw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_coordinates_are_treated_as_missing() {
        let sub = Substation {
            id: "s1".into(),
            voltage_kv: 220.0,
            lat: Some(0.0),
            lon: Some(9.0),
            name: None,
            country: None,
        };
        assert!(sub.coord().is_none());
    }

    #[test]
    fn nan_coordinates_are_rejected() {
        assert!(Coord::from_parts(Some(f64::NAN), Some(1.0)).is_none());
        assert!(Coord::from_parts(Some(45.0), None).is_none());
    }

    #[test]
    fn line_kind_defaults_to_ac() {
        assert_eq!(LineKind::parse(None), LineKind::Ac);
        assert_eq!(LineKind::parse(Some("ac")), LineKind::Ac);
        assert_eq!(LineKind::parse(Some(" DC ")), LineKind::Dc);
    }

    #[test]
    fn peak_demand_sums_across_buses() {
        let profiles = LoadProfiles {
            timestamps: vec!["h0".into(), "h1".into()],
            bus_ids: vec!["A".into(), "B".into()],
            weights: vec![0.5, 0.5],
            rows: vec![vec![10.0, 10.0], vec![30.0, 15.0]],
        };
        assert_eq!(profiles.peak_demand_mw(), 45.0);
    }
}
