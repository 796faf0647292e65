//! Spatial reduction of substations into aggregate nodes.
//!
//! Two strategies share the [`SpatialReducer`] trait: [`ClusterReducer`]
//! (seeded k-means) and [`ZoneReducer`] (bidding-zone mapping). Both take
//! the filtered substation set and return a [`Reduction`] in which every
//! substation belongs to exactly one node.

use std::collections::{BTreeMap, HashMap};

use super::kmeans::KMeans;
use super::nearest::nearest_label;
use super::tables::LookupTables;
use super::types::{AggregateNode, Coord, Substation};
use super::zones::{RegionPolygons, ZoneMapper, ZoneMatch};
use crate::error::ReduceError;

/// A substation that passed filtering, with its validated coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    pub substation: Substation,
    pub coord: Coord,
}

/// Keeps substations at or above `min_voltage_kv` with usable coordinates.
///
/// Input order is preserved.
pub fn filter_substations(substations: &[Substation], min_voltage_kv: f64) -> Vec<Site> {
    substations
        .iter()
        .filter(|s| s.voltage_kv.is_finite() && s.voltage_kv >= min_voltage_kv)
        .filter_map(|s| {
            s.coord().map(|coord| Site {
                substation: s.clone(),
                coord,
            })
        })
        .collect()
}

/// Output of a spatial reduction.
#[derive(Debug, Clone, PartialEq)]
pub struct Reduction {
    /// Filtered substations, in input order.
    pub sites: Vec<Site>,
    /// Node index for each entry of `sites`.
    pub assignment: Vec<usize>,
    /// Aggregate nodes, indexed by the values of `assignment`.
    pub nodes: Vec<AggregateNode>,
}

impl Reduction {
    pub fn node_coords(&self) -> Vec<Coord> {
        self.nodes.iter().map(|n| n.coord).collect()
    }

    /// Substation id → node index.
    pub fn substation_nodes(&self) -> HashMap<&str, usize> {
        self.sites
            .iter()
            .zip(&self.assignment)
            .map(|(site, &node)| (site.substation.id.as_str(), node))
            .collect()
    }
}

/// Strategy interface for collapsing substations into aggregate nodes.
pub trait SpatialReducer {
    /// Groups `sites` into nodes.
    ///
    /// # Errors
    ///
    /// Returns a [`ReduceError`] when the sites cannot be grouped.
    fn reduce(&self, sites: Vec<Site>) -> Result<Reduction, ReduceError>;
}

/// k-means reduction to a fixed number of nodes.
#[derive(Debug, Clone)]
pub struct ClusterReducer {
    pub kmeans: KMeans,
    /// Node id prefix, e.g. `IT` gives `IT_00`, `IT_01`, ...
    pub bus_prefix: String,
    /// Labelled points used only to name the clusters.
    pub region_centroids: Vec<(String, Coord)>,
}

impl SpatialReducer for ClusterReducer {
    fn reduce(&self, sites: Vec<Site>) -> Result<Reduction, ReduceError> {
        let points: Vec<Coord> = sites.iter().map(|s| s.coord).collect();
        let fit = self.kmeans.fit(&points)?;

        let mut counts = vec![0_usize; fit.centroids.len()];
        let mut max_voltage = vec![0.0_f64; fit.centroids.len()];
        for (site, &label) in sites.iter().zip(&fit.labels) {
            counts[label] += 1;
            max_voltage[label] = max_voltage[label].max(site.substation.voltage_kv);
        }

        let nodes: Vec<AggregateNode> = fit
            .centroids
            .iter()
            .enumerate()
            .map(|(i, centroid)| AggregateNode {
                id: format!("{}_{i:02}", self.bus_prefix),
                coord: *centroid,
                n_substations: counts[i],
                max_voltage_kv: max_voltage[i],
                region: nearest_label(&self.region_centroids, centroid).map(str::to_string),
            })
            .collect();

        tracing::info!(
            substations = sites.len(),
            nodes = nodes.len(),
            inertia = fit.inertia,
            "clustered substations"
        );

        Ok(Reduction {
            sites,
            assignment: fit.labels,
            nodes,
        })
    }
}

/// Bidding-zone reduction: one node per zone code.
#[derive(Debug, Clone)]
pub struct ZoneReducer {
    pub regions: RegionPolygons,
    pub tables: LookupTables,
    pub coastal_threshold_deg: f64,
    /// Zones emitted even when no substation maps to them.
    pub include_zones: Vec<String>,
}

impl SpatialReducer for ZoneReducer {
    fn reduce(&self, sites: Vec<Site>) -> Result<Reduction, ReduceError> {
        let mapper = ZoneMapper {
            regions: &self.regions,
            tables: &self.tables,
            coastal_threshold_deg: self.coastal_threshold_deg,
        };

        let mut site_zones = Vec::with_capacity(sites.len());
        let mut matched: BTreeMap<&'static str, usize> = BTreeMap::new();
        for site in &sites {
            let (zone, how) = mapper
                .assign(&site.coord, site.substation.country.as_deref())
                .ok_or(ReduceError::NoZones)?;
            *matched.entry(match_label(how)).or_default() += 1;
            site_zones.push(zone);
        }

        // BTreeMap keeps the node order sorted by zone code.
        let mut members: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (i, zone) in site_zones.iter().enumerate() {
            members.entry(zone.clone()).or_default().push(i);
        }
        for zone in &self.include_zones {
            members.entry(zone.clone()).or_default();
        }

        let mut nodes = Vec::with_capacity(members.len());
        let mut zone_index = HashMap::with_capacity(members.len());
        for (zone, idxs) in &members {
            let coord = if idxs.is_empty() {
                self.tables.zone_point(zone).unwrap_or(Coord::new(0.0, 0.0))
            } else {
                mean_coord(idxs.iter().map(|&i| sites[i].coord))
            };
            let max_voltage_kv = idxs
                .iter()
                .map(|&i| sites[i].substation.voltage_kv)
                .fold(0.0, f64::max);
            zone_index.insert(zone.as_str(), nodes.len());
            nodes.push(AggregateNode {
                id: zone.clone(),
                coord,
                n_substations: idxs.len(),
                max_voltage_kv,
                region: Some(zone.clone()),
            });
        }

        let assignment = site_zones
            .iter()
            .map(|z| zone_index.get(z.as_str()).copied().unwrap_or(0))
            .collect();

        tracing::info!(
            substations = sites.len(),
            zones = nodes.len(),
            ?matched,
            "mapped substations to zones"
        );

        Ok(Reduction {
            sites,
            assignment,
            nodes,
        })
    }
}

fn match_label(how: ZoneMatch) -> &'static str {
    match how {
        ZoneMatch::Country => "country",
        ZoneMatch::Contained => "contained",
        ZoneMatch::Coastal => "coastal",
        ZoneMatch::Neighbour => "neighbour",
    }
}

fn mean_coord(coords: impl Iterator<Item = Coord>) -> Coord {
    let (mut lat, mut lon, mut n) = (0.0, 0.0, 0_usize);
    for c in coords {
        lat += c.lat;
        lon += c.lon;
        n += 1;
    }
    if n == 0 {
        return Coord::new(0.0, 0.0);
    }
    Coord::new(lat / n as f64, lon / n as f64)
}
