//! Line aggregation: endpoint mapping, corridor grouping, and capacity
//! estimation.

use std::collections::{BTreeMap, HashMap};

use super::nearest::nearest_index;
use super::reducer::Reduction;
use super::types::{AggregateEdge, CapacityOrigin, Coord, LineKind, TransmissionLine};
use crate::market::records::TransmissionLimit;

/// Per-unit reactance per km of line.
pub const REACTANCE_PER_KM: f64 = 0.0001;

/// Parallel lines between two nodes, folded into one corridor.
#[derive(Debug, Clone, PartialEq)]
pub struct CorridorGroup {
    pub bus0: String,
    pub bus1: String,
    pub kind: LineKind,
    pub n_lines: usize,
    pub max_voltage_kv: f64,
    pub mean_length_km: f64,
    pub total_circuits: f64,
    /// Summed rating of DC links in the group (MW).
    pub dc_p_nom: f64,
}

/// A provider of corridor transfer capacity.
///
/// Sources are consulted in order by [`LineAggregator`]; the first one that
/// knows the corridor wins.
pub trait CapacitySource {
    /// Capacity (MW) and its origin, or `None` if this source has no value.
    fn capacity(&self, group: &CorridorGroup) -> Option<(f64, CapacityOrigin)>;
}

/// Voltage-tier rule for AC corridors; summed link rating for DC ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicCapacity;

impl HeuristicCapacity {
    /// MW per circuit for a voltage level.
    pub fn tier_mw(voltage_kv: f64) -> f64 {
        if voltage_kv >= 380.0 {
            1500.0
        } else if voltage_kv >= 220.0 {
            500.0
        } else {
            200.0
        }
    }
}

impl CapacitySource for HeuristicCapacity {
    fn capacity(&self, group: &CorridorGroup) -> Option<(f64, CapacityOrigin)> {
        if group.kind == LineKind::Dc && group.dc_p_nom > 0.0 {
            return Some((group.dc_p_nom, CapacityOrigin::Estimated));
        }
        let n = group.total_circuits.max(group.n_lines as f64);
        Some((Self::tier_mw(group.max_voltage_kv) * n, CapacityOrigin::Estimated))
    }
}

/// Operator-published transfer limits between zones.
///
/// The corridor limit is the largest directional limit seen in any period,
/// in either direction.
#[derive(Debug, Clone, Default)]
pub struct MeasuredLimits {
    limits: HashMap<(String, String), f64>,
}

impl MeasuredLimits {
    pub fn from_records(records: &[TransmissionLimit]) -> Self {
        let mut limits: HashMap<(String, String), f64> = HashMap::new();
        for r in records {
            let key = corridor_key(&r.from, &r.to);
            let best = r.limit_from.max(r.limit_to);
            if best.is_finite() && best > 0.0 {
                let slot = limits.entry(key).or_insert(0.0);
                *slot = slot.max(best);
            }
        }
        Self { limits }
    }

    /// Limit for a corridor between two zones, in either direction.
    pub fn corridor(&self, a: &str, b: &str) -> Option<f64> {
        self.limits.get(&corridor_key(a, b)).copied()
    }

    pub fn len(&self) -> usize {
        self.limits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limits.is_empty()
    }
}

impl CapacitySource for MeasuredLimits {
    fn capacity(&self, group: &CorridorGroup) -> Option<(f64, CapacityOrigin)> {
        self.corridor(&group.bus0, &group.bus1)
            .map(|mw| (mw, CapacityOrigin::Measured))
    }
}

fn corridor_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// Extracts the first run of ASCII digits from a free-text circuit count.
///
/// `"2"` → 2, `"1;2"` → 1, `"2.0"` → 2; anything without digits → 0.
pub fn parse_circuits(raw: Option<&str>) -> f64 {
    let Some(raw) = raw else {
        return 0.0;
    };
    let digits: String = raw
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse::<f64>().unwrap_or(0.0)
}

/// Folds raw lines onto the reduced node set.
pub struct LineAggregator {
    sources: Vec<Box<dyn CapacitySource>>,
}

impl Default for LineAggregator {
    fn default() -> Self {
        Self {
            sources: vec![Box::new(HeuristicCapacity)],
        }
    }
}

impl LineAggregator {
    /// Puts `source` ahead of the ones already configured.
    pub fn with_override(mut self, source: Box<dyn CapacitySource>) -> Self {
        self.sources.insert(0, source);
        self
    }

    /// Maps each line to a node pair and collapses parallel lines.
    ///
    /// Endpoints named by substation id resolve through the reduction's
    /// assignment; otherwise the nearest node to the endpoint coordinate is
    /// used. Lines with unresolvable endpoints or both ends on one node are
    /// dropped. Edges come out ordered by (bus0 index, bus1 index, kind).
    pub fn aggregate(&self, lines: &[TransmissionLine], reduction: &Reduction) -> Vec<AggregateEdge> {
        let by_substation = reduction.substation_nodes();
        let coords = reduction.node_coords();

        let mut groups: BTreeMap<(usize, usize, LineKind), Accumulator> = BTreeMap::new();
        let (mut unresolved, mut internal, mut unrated) = (0_usize, 0_usize, 0_usize);

        for line in lines {
            let a = resolve(line.bus0.as_deref(), line.start(), &by_substation, &coords);
            let b = resolve(line.bus1.as_deref(), line.end(), &by_substation, &coords);
            let (Some(a), Some(b)) = (a, b) else {
                unresolved += 1;
                continue;
            };
            if a == b {
                internal += 1;
                continue;
            }
            if !has_voltage(line) {
                unrated += 1;
                tracing::debug!(line = %line.id, "line has no usable voltage");
            }
            let key = (a.min(b), a.max(b), line.line_kind());
            groups.entry(key).or_default().add(line);
        }

        let edges: Vec<AggregateEdge> = groups
            .into_iter()
            .map(|((i, j, kind), acc)| {
                if acc.rated == 0 {
                    tracing::warn!(
                        bus0 = %reduction.nodes[i].id,
                        bus1 = %reduction.nodes[j].id,
                        lines = acc.n,
                        "corridor has no usable voltage, using lowest capacity tier"
                    );
                }
                let group = acc.finish(
                    reduction.nodes[i].id.clone(),
                    reduction.nodes[j].id.clone(),
                    kind,
                );
                self.build_edge(group)
            })
            .collect();

        tracing::info!(
            lines = lines.len(),
            unresolved,
            internal,
            unrated,
            edges = edges.len(),
            "aggregated lines"
        );
        edges
    }

    fn build_edge(&self, group: CorridorGroup) -> AggregateEdge {
        let (s_nom, capacity_origin) = self
            .sources
            .iter()
            .find_map(|s| s.capacity(&group))
            .unwrap_or((0.0, CapacityOrigin::Estimated));

        let id = match group.kind {
            LineKind::Ac => format!("{}_{}", group.bus0, group.bus1),
            LineKind::Dc => format!("{}_{}_DC", group.bus0, group.bus1),
        };

        AggregateEdge {
            id,
            x: group.mean_length_km * REACTANCE_PER_KM,
            voltage_kv: group.max_voltage_kv,
            length_km: group.mean_length_km,
            s_nom,
            n_lines: group.n_lines,
            total_circuits: group.total_circuits,
            kind: group.kind,
            capacity_origin,
            bus0: group.bus0,
            bus1: group.bus1,
        }
    }
}

fn resolve(
    substation: Option<&str>,
    coord: Option<Coord>,
    by_substation: &HashMap<&str, usize>,
    nodes: &[Coord],
) -> Option<usize> {
    substation
        .and_then(|id| by_substation.get(id).copied())
        .or_else(|| coord.and_then(|c| nearest_index(nodes, &c)))
}

fn has_voltage(line: &TransmissionLine) -> bool {
    line.voltage_kv.is_finite() && line.voltage_kv > 0.0
}

#[derive(Debug, Default)]
struct Accumulator {
    n: usize,
    /// Lines with a usable voltage.
    rated: usize,
    max_voltage: f64,
    total_length: f64,
    circuits: f64,
    p_nom: f64,
}

impl Accumulator {
    fn add(&mut self, line: &TransmissionLine) {
        self.n += 1;
        if has_voltage(line) {
            self.rated += 1;
            self.max_voltage = self.max_voltage.max(line.voltage_kv);
        }
        if line.length_km.is_finite() {
            self.total_length += line.length_km;
        }
        self.circuits += parse_circuits(line.circuits.as_deref());
        self.p_nom += line.p_nom.filter(|p| p.is_finite()).unwrap_or(0.0);
    }

    fn finish(self, bus0: String, bus1: String, kind: LineKind) -> CorridorGroup {
        CorridorGroup {
            bus0,
            bus1,
            kind,
            n_lines: self.n,
            max_voltage_kv: self.max_voltage,
            mean_length_km: self.total_length / self.n.max(1) as f64,
            total_circuits: self.circuits,
            dc_p_nom: self.p_nom,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(kind: LineKind, voltage: f64, n: usize, circuits: f64) -> CorridorGroup {
        CorridorGroup {
            bus0: "NORD".into(),
            bus1: "CNOR".into(),
            kind,
            n_lines: n,
            max_voltage_kv: voltage,
            mean_length_km: 100.0,
            total_circuits: circuits,
            dc_p_nom: 0.0,
        }
    }

    fn line(id: &str, voltage_kv: f64) -> TransmissionLine {
        TransmissionLine {
            id: id.into(),
            lat_start: None,
            lon_start: None,
            lat_end: None,
            lon_end: None,
            bus0: None,
            bus1: None,
            voltage_kv,
            length_km: 10.0,
            circuits: None,
            kind: None,
            p_nom: None,
        }
    }

    #[test]
    fn unrated_lines_fall_to_lowest_tier() {
        let mut acc = Accumulator::default();
        acc.add(&line("a", f64::NAN));
        acc.add(&line("b", -5.0));
        assert_eq!(acc.rated, 0);
        let g = acc.finish("NORD".into(), "CNOR".into(), LineKind::Ac);
        assert_eq!(g.max_voltage_kv, 0.0);
        assert_eq!(HeuristicCapacity.capacity(&g).map(|c| c.0), Some(400.0));

        let mut acc = Accumulator::default();
        acc.add(&line("a", f64::NAN));
        acc.add(&line("b", 380.0));
        assert_eq!(acc.rated, 1);
        assert_eq!(acc.finish("NORD".into(), "CNOR".into(), LineKind::Ac).max_voltage_kv, 380.0);
    }

    #[test]
    fn circuits_take_first_digit_run() {
        assert_eq!(parse_circuits(Some("2")), 2.0);
        assert_eq!(parse_circuits(Some("1;2")), 1.0);
        assert_eq!(parse_circuits(Some("2.0")), 2.0);
        assert_eq!(parse_circuits(Some("n/a")), 0.0);
        assert_eq!(parse_circuits(None), 0.0);
    }

    #[test]
    fn heuristic_tiers() {
        let h = HeuristicCapacity;
        assert_eq!(h.capacity(&group(LineKind::Ac, 380.0, 1, 0.0)).map(|c| c.0), Some(1500.0));
        assert_eq!(h.capacity(&group(LineKind::Ac, 220.0, 1, 0.0)).map(|c| c.0), Some(500.0));
        assert_eq!(h.capacity(&group(LineKind::Ac, 150.0, 1, 0.0)).map(|c| c.0), Some(200.0));
        // max(circuits, count)
        assert_eq!(h.capacity(&group(LineKind::Ac, 380.0, 1, 2.0)).map(|c| c.0), Some(3000.0));
        assert_eq!(h.capacity(&group(LineKind::Ac, 220.0, 3, 1.0)).map(|c| c.0), Some(1500.0));
    }

    #[test]
    fn dc_uses_summed_rating() {
        let mut g = group(LineKind::Dc, 500.0, 2, 0.0);
        g.dc_p_nom = 1000.0;
        assert_eq!(
            HeuristicCapacity.capacity(&g),
            Some((1000.0, CapacityOrigin::Estimated))
        );
    }

    #[test]
    fn measured_limits_match_either_direction() {
        let records = vec![
            TransmissionLimit {
                from: "CNOR".into(),
                to: "NORD".into(),
                hour: 1,
                period: 1,
                limit_from: 3000.0,
                limit_to: 2500.0,
            },
            TransmissionLimit {
                from: "NORD".into(),
                to: "CNOR".into(),
                hour: 2,
                period: 1,
                limit_from: 3200.0,
                limit_to: 0.0,
            },
        ];
        let limits = MeasuredLimits::from_records(&records);
        assert_eq!(limits.corridor("NORD", "CNOR"), Some(3200.0));
        assert_eq!(
            limits.capacity(&group(LineKind::Ac, 380.0, 1, 0.0)),
            Some((3200.0, CapacityOrigin::Measured))
        );
        assert_eq!(limits.corridor("SUD", "CALA"), None);
    }
}
