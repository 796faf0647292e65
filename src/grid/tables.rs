//! Static lookup tables shared by the reducers and aggregators.

use std::collections::BTreeMap;

use super::types::Coord;

/// Marginal cost used for carriers missing from the cost table (EUR/MWh).
pub const FALLBACK_MARGINAL_COST: f64 = 100.0;

/// Zone assigned to domestic points whose nearest region has no zone entry.
pub const FALLBACK_DOMESTIC_ZONE: &str = "NORD";

/// Domestic bidding zones, north to south then islands.
pub const DOMESTIC_ZONES: &[&str] = &["NORD", "CNOR", "CSUD", "SUD", "CALA", "SICI", "SARD"];

const FUEL_COSTS: &[(&str, f64)] = &[
    ("CCGT", 65.0),
    ("coal", 45.0),
    ("oil", 120.0),
    ("hydro", 5.0),
    ("solar", 0.0),
    ("wind", 0.0),
    ("biomass", 80.0),
    ("biogas", 75.0),
    ("geothermal", 10.0),
    ("waste", 50.0),
    ("other", 90.0),
];

const REGION_CENTROIDS: &[(&str, f64, f64)] = &[
    ("Sicilia", 37.5, 14.0),
    ("Calabria", 38.9, 16.3),
    ("Puglia", 41.0, 17.0),
    ("Basilicata", 40.5, 16.0),
    ("Campania", 40.8, 14.8),
    ("Sardegna", 40.0, 9.0),
    ("Lazio", 41.9, 12.5),
    ("Abruzzo", 42.3, 13.8),
    ("Molise", 41.7, 14.7),
    ("Marche", 43.3, 13.5),
    ("Umbria", 42.8, 12.6),
    ("Toscana", 43.3, 11.2),
    ("Emilia-Romagna", 44.5, 11.3),
    ("Liguria", 44.3, 8.9),
    ("Piemonte", 45.0, 7.7),
    ("Valle d'Aosta", 45.7, 7.3),
    ("Lombardia", 45.5, 9.5),
    ("Trentino", 46.1, 11.1),
    ("Veneto", 45.5, 11.8),
    ("Friuli", 46.0, 13.2),
];

const REGION_TO_ZONE: &[(&str, &str)] = &[
    ("Piemonte", "NORD"),
    ("Valle d'Aosta/Vallée d'Aoste", "NORD"),
    ("Lombardia", "NORD"),
    ("Trentino-Alto Adige/Südtirol", "NORD"),
    ("Veneto", "NORD"),
    ("Friuli-Venezia Giulia", "NORD"),
    ("Liguria", "NORD"),
    ("Emilia-Romagna", "NORD"),
    ("Toscana", "CNOR"),
    ("Umbria", "CNOR"),
    ("Marche", "CNOR"),
    ("Lazio", "CSUD"),
    ("Abruzzo", "CSUD"),
    ("Molise", "CSUD"),
    ("Campania", "CSUD"),
    ("Puglia", "SUD"),
    ("Basilicata", "SUD"),
    ("Calabria", "CALA"),
    ("Sicilia", "SICI"),
    ("Sardegna", "SARD"),
];

const COUNTRY_TO_ZONE: &[(&str, &str)] = &[
    ("AT", "AUST"),
    ("FR", "FRAN"),
    ("CH", "SVIZ"),
    ("SI", "SLOV"),
    ("GR", "GREC"),
    ("ME", "MONT"),
];

/// Approximate centres of the domestic bidding zones.
const DOMESTIC_ZONE_POINTS: &[(&str, f64, f64)] = &[
    ("NORD", 45.4, 9.9),
    ("CNOR", 43.4, 11.5),
    ("CSUD", 41.7, 13.4),
    ("SUD", 40.9, 16.3),
    ("CALA", 38.9, 16.4),
    ("SICI", 37.5, 14.1),
    ("SARD", 40.1, 9.0),
];

/// Approximate reference points of the neighbouring market zones.
const NEIGHBOUR_POINTS: &[(&str, f64, f64)] = &[
    ("AUST", 47.3, 13.3),
    ("FRAN", 45.5, 5.5),
    ("SVIZ", 46.8, 8.2),
    ("SLOV", 46.1, 14.8),
    ("GREC", 39.5, 21.8),
    ("MONT", 42.7, 19.3),
];

/// Consolidated static tables used across one aggregation run.
///
/// Built once from the defaults and optionally patched from configuration
/// (marginal-cost overrides).
#[derive(Debug, Clone)]
pub struct LookupTables {
    /// Carrier → marginal cost (EUR/MWh).
    pub fuel_costs: BTreeMap<String, f64>,
    /// Cost for carriers missing from `fuel_costs`.
    pub fallback_cost: f64,
    /// Labelled region centroids for cluster naming.
    pub region_centroids: Vec<(String, Coord)>,
    /// Administrative region name → bidding zone.
    pub region_to_zone: BTreeMap<String, String>,
    /// ISO country code → neighbouring market zone.
    pub country_to_zone: BTreeMap<String, String>,
    /// Reference points of neighbouring zones, for far-offshore fallbacks.
    pub neighbour_points: Vec<(String, Coord)>,
    /// Centres of the domestic zones, used to place zones with no members.
    pub domestic_zone_points: Vec<(String, Coord)>,
}

impl Default for LookupTables {
    fn default() -> Self {
        Self {
            fuel_costs: FUEL_COSTS
                .iter()
                .map(|(carrier, cost)| ((*carrier).to_string(), *cost))
                .collect(),
            fallback_cost: FALLBACK_MARGINAL_COST,
            region_centroids: labelled_points(REGION_CENTROIDS),
            region_to_zone: string_map(REGION_TO_ZONE),
            country_to_zone: string_map(COUNTRY_TO_ZONE),
            neighbour_points: labelled_points(NEIGHBOUR_POINTS),
            domestic_zone_points: labelled_points(DOMESTIC_ZONE_POINTS),
        }
    }
}

impl LookupTables {
    /// Marginal cost for a carrier, falling back to `fallback_cost`.
    pub fn marginal_cost(&self, carrier: &str) -> f64 {
        self.fuel_costs
            .get(carrier)
            .copied()
            .unwrap_or(self.fallback_cost)
    }

    /// Zone for an administrative region name.
    pub fn zone_for_region(&self, region: &str) -> Option<&str> {
        self.region_to_zone.get(region).map(String::as_str)
    }

    /// Zone for a neighbouring country code (case-insensitive).
    pub fn zone_for_country(&self, country: &str) -> Option<&str> {
        self.country_to_zone
            .get(&country.trim().to_ascii_uppercase())
            .map(String::as_str)
    }

    /// Reference location of any known zone code.
    pub fn zone_point(&self, zone: &str) -> Option<Coord> {
        self.domestic_zone_points
            .iter()
            .chain(&self.neighbour_points)
            .find(|(code, _)| code == zone)
            .map(|(_, c)| *c)
    }
}

fn labelled_points(raw: &[(&str, f64, f64)]) -> Vec<(String, Coord)> {
    raw.iter()
        .map(|(name, lat, lon)| ((*name).to_string(), Coord::new(*lat, *lon)))
        .collect()
}

fn string_map(raw: &[(&str, &str)]) -> BTreeMap<String, String> {
    raw.iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}
