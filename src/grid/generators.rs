//! Generator aggregation per (node, carrier).

use std::collections::BTreeMap;

use super::nearest::nearest_index;
use super::tables::LookupTables;
use super::types::{AggregateGenerator, AggregateNode, Coord, Generator};

/// Sums generator capacity per (node, carrier).
///
/// Each unit goes to its nearest node; units without coordinates go to
/// node 0. Output is ordered by node index, then carrier name.
///
/// # Arguments
///
/// * `generators` - Raw generation units
/// * `nodes` - Reduced node table (must be non-empty for any output)
/// * `tables` - Source of marginal costs
pub fn aggregate_generators(
    generators: &[Generator],
    nodes: &[AggregateNode],
    tables: &LookupTables,
) -> Vec<AggregateGenerator> {
    if nodes.is_empty() {
        return Vec::new();
    }
    let coords: Vec<Coord> = nodes.iter().map(|n| n.coord).collect();

    let mut groups: BTreeMap<(usize, &str), (f64, usize)> = BTreeMap::new();
    let mut defaulted = 0_usize;
    for g in generators {
        let node = match g.coord() {
            Some(c) => nearest_index(&coords, &c).unwrap_or(0),
            None => {
                defaulted += 1;
                0
            }
        };
        let capacity = if g.capacity_mw.is_finite() {
            g.capacity_mw
        } else {
            0.0
        };
        let slot = groups.entry((node, g.carrier.as_str())).or_default();
        slot.0 += capacity;
        slot.1 += 1;
    }

    if defaulted > 0 {
        tracing::warn!(
            count = defaulted,
            node = %nodes[0].id,
            "generators without coordinates assigned to default node"
        );
    }

    let out: Vec<AggregateGenerator> = groups
        .into_iter()
        .map(|((node, carrier), (p_nom, n_units))| {
            let bus = nodes[node].id.clone();
            AggregateGenerator {
                id: format!("{bus}_{carrier}"),
                bus,
                carrier: carrier.to_string(),
                p_nom,
                marginal_cost: tables.marginal_cost(carrier),
                n_units,
            }
        })
        .collect();

    tracing::info!(units = generators.len(), groups = out.len(), "aggregated generators");
    out
}
