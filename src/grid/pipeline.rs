//! End-to-end aggregation: raw topology in, reduced network out.

use super::generators::aggregate_generators;
use super::kmeans::KMeans;
use super::lines::{LineAggregator, MeasuredLimits};
use super::load::distribute_load;
use super::reducer::{ClusterReducer, SpatialReducer, ZoneReducer, filter_substations};
use super::tables::LookupTables;
use super::types::{
    AggregateEdge, AggregateGenerator, AggregateNode, LoadProfiles, NetworkSummary, Substation,
};
use crate::config::{AggregationConfig, ReductionStrategy};
use crate::error::{InputError, PipelineError, ReduceError};
use crate::io::export::write_network;
use crate::io::input::{RawTopology, TopologyPaths, load_topology, read_regions, read_table};
use crate::market::records::TransmissionLimit;

/// A reduced network and its per-node demand.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedNetwork {
    pub nodes: Vec<AggregateNode>,
    pub edges: Vec<AggregateEdge>,
    pub generators: Vec<AggregateGenerator>,
    pub load: LoadProfiles,
    pub summary: NetworkSummary,
}

/// Reduces a raw topology with the given strategy.
///
/// Substations are filtered by `min_voltage_kv`, grouped by `reducer`, and
/// the lines, generators, and demand are folded onto the resulting nodes.
///
/// # Errors
///
/// Returns [`ReduceError::NoSubstations`] if filtering leaves nothing, or
/// any error raised by the reducer.
pub fn build_network(
    topology: &RawTopology,
    reducer: &dyn SpatialReducer,
    lines: &LineAggregator,
    tables: &LookupTables,
    min_voltage_kv: f64,
) -> Result<AggregatedNetwork, ReduceError> {
    let sites = filter_substations(&topology.substations, min_voltage_kv);
    tracing::info!(
        kept = sites.len(),
        total = topology.substations.len(),
        min_voltage_kv,
        "filtered substations"
    );
    if sites.is_empty() {
        return Err(ReduceError::NoSubstations { min_voltage_kv });
    }

    let reduction = reducer.reduce(sites)?;
    let edges = lines.aggregate(&topology.lines, &reduction);
    let generators = aggregate_generators(&topology.generators, &reduction.nodes, tables);
    let load = distribute_load(&topology.demand, &reduction.nodes);

    let summary = NetworkSummary {
        n_buses: reduction.nodes.len(),
        n_lines: edges.len(),
        n_generators: generators.len(),
        total_gen_capacity_mw: generators.iter().map(|g| g.p_nom).sum(),
        total_line_capacity_mw: edges.iter().map(|e| e.s_nom).sum(),
        peak_demand_mw: load.peak_demand_mw(),
    };
    tracing::info!(
        buses = summary.n_buses,
        lines = summary.n_lines,
        generators = summary.n_generators,
        "built aggregated network"
    );

    Ok(AggregatedNetwork {
        nodes: reduction.nodes,
        edges,
        generators,
        load,
        summary,
    })
}

/// Builds the reducer named by `config.reduction.strategy`.
///
/// # Errors
///
/// Returns an [`InputError`] when the `zones` strategy cannot read its
/// region polygons.
pub fn reducer_for(
    config: &AggregationConfig,
    tables: &LookupTables,
) -> Result<Box<dyn SpatialReducer>, InputError> {
    let r = &config.reduction;
    tracing::debug!(strategy = %r.strategy, "building reducer");
    match r.strategy {
        ReductionStrategy::Zones => {
            let path = config
                .input
                .regions
                .as_deref()
                .ok_or_else(|| InputError::Missing("<input.regions>".into()))?;
            Ok(Box::new(ZoneReducer {
                regions: read_regions(path)?,
                tables: tables.clone(),
                coastal_threshold_deg: r.coastal_threshold_deg,
                include_zones: r.include_zones.clone(),
            }))
        }
        ReductionStrategy::Kmeans => Ok(Box::new(ClusterReducer {
            kmeans: KMeans {
                k: r.n_clusters,
                seed: r.seed,
                n_init: r.n_init,
                max_iter: r.max_iter,
            },
            bus_prefix: r.bus_prefix.clone(),
            region_centroids: tables.region_centroids.clone(),
        })),
    }
}

/// Runs a configured aggregation and writes its tables to `output.dir`.
///
/// The configuration should already have passed
/// [`AggregationConfig::validate`].
///
/// # Errors
///
/// Returns a [`PipelineError`] for unreadable inputs, failed reductions, or
/// unwritable outputs.
pub fn run(config: &AggregationConfig) -> Result<AggregatedNetwork, PipelineError> {
    let input = &config.input;
    let mut topology = load_topology(TopologyPaths {
        substations: &input.substations,
        lines: &input.lines,
        generators: &input.generators,
        demand: &input.demand,
    })?;
    retain_countries(&mut topology.substations, &config.reduction.countries);

    let tables = config.lookup_tables();
    let reducer = reducer_for(config, &tables)?;

    let mut lines = LineAggregator::default();
    if let Some(path) = &config.capacity.limits {
        let records: Vec<TransmissionLimit> = read_table(path)?;
        let limits = MeasuredLimits::from_records(&records);
        tracing::info!(corridors = limits.len(), path = %path.display(), "loaded measured limits");
        lines = lines.with_override(Box::new(limits));
    }

    let network = build_network(
        &topology,
        reducer.as_ref(),
        &lines,
        &tables,
        config.reduction.min_voltage_kv,
    )?;
    write_network(&network, &config.output.dir)?;
    tracing::info!(dir = %config.output.dir.display(), "wrote aggregated network");
    Ok(network)
}

/// Drops substations whose country code is outside `countries`.
///
/// An empty list keeps everything, as do substations with no country code.
fn retain_countries(substations: &mut Vec<Substation>, countries: &[String]) {
    if countries.is_empty() {
        return;
    }
    let before = substations.len();
    substations.retain(|s| match s.country.as_deref().map(str::trim) {
        None | Some("") => true,
        Some(code) => countries.iter().any(|c| c.eq_ignore_ascii_case(code)),
    });
    tracing::debug!(
        dropped = before - substations.len(),
        "filtered substations by country"
    );
}
