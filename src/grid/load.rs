//! Distribution of system demand across aggregate nodes.

use super::types::{AggregateNode, DemandSeries, LoadProfiles};

/// Regional multiplier for a node latitude.
pub fn latitude_band(lat: f64) -> f64 {
    if lat > 45.0 {
        1.5
    } else if lat > 43.0 {
        1.2
    } else if lat > 41.0 {
        1.0
    } else {
        0.8
    }
}

/// Per-node demand shares: latitude band × substation count, normalized.
///
/// If every raw weight is zero the shares are uniform.
pub fn load_weights(nodes: &[AggregateNode]) -> Vec<f64> {
    let raw: Vec<f64> = nodes
        .iter()
        .map(|n| latitude_band(n.coord.lat) * n.n_substations as f64)
        .collect();
    let total: f64 = raw.iter().sum();
    if total > 0.0 {
        raw.iter().map(|w| w / total).collect()
    } else if nodes.is_empty() {
        Vec::new()
    } else {
        vec![1.0 / nodes.len() as f64; nodes.len()]
    }
}

/// Splits `demand` across `nodes` by [`load_weights`].
pub fn distribute_load(demand: &DemandSeries, nodes: &[AggregateNode]) -> LoadProfiles {
    let weights = load_weights(nodes);
    let rows = demand
        .demand_mw
        .iter()
        .map(|d| weights.iter().map(|w| d * w).collect())
        .collect();

    tracing::info!(
        hours = demand.len(),
        buses = nodes.len(),
        "distributed demand"
    );

    LoadProfiles {
        timestamps: demand.timestamps.clone(),
        bus_ids: nodes.iter().map(|n| n.id.clone()).collect(),
        weights,
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::types::Coord;

    fn node(lat: f64, n: usize) -> AggregateNode {
        AggregateNode {
            id: format!("N{lat}"),
            coord: Coord::new(lat, 10.0),
            n_substations: n,
            max_voltage_kv: 220.0,
            region: None,
        }
    }

    #[test]
    fn band_boundaries_are_exclusive() {
        assert_eq!(latitude_band(45.5), 1.5);
        assert_eq!(latitude_band(45.0), 1.2);
        assert_eq!(latitude_band(43.0), 1.0);
        assert_eq!(latitude_band(41.0), 0.8);
    }

    #[test]
    fn weights_follow_band_and_count() {
        let nodes = vec![node(45.0045, 2), node(41.0, 1)];
        let w = load_weights(&nodes);
        // 1.5*2 = 3.0 and 0.8*1 = 0.8
        assert!((w[0] - 3.0 / 3.8).abs() < 1e-12);
        assert!((w[1] - 0.8 / 3.8).abs() < 1e-12);
    }

    #[test]
    fn zero_members_fall_back_to_uniform() {
        let nodes = vec![node(44.0, 0), node(40.0, 0)];
        assert_eq!(load_weights(&nodes), vec![0.5, 0.5]);
    }

    #[test]
    fn rows_sum_to_demand() {
        let nodes = vec![node(46.0, 3), node(42.0, 2), node(38.0, 1)];
        let demand = DemandSeries {
            timestamps: vec!["t0".into(), "t1".into()],
            demand_mw: vec![30000.0, 25000.0],
        };
        let profiles = distribute_load(&demand, &nodes);
        for (row, d) in profiles.rows.iter().zip(&demand.demand_mw) {
            let s: f64 = row.iter().sum();
            assert!((s - d).abs() < 1e-6);
        }
        assert!((profiles.peak_demand_mw() - 30000.0).abs() < 1e-6);
    }
}
