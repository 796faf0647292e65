//! Corridor congestion analysis of scheduled zonal transits.
//!
//! Each transit record is paired with a transfer capacity, either the
//! published hourly limit for that corridor and period or the `s_nom` of the
//! matching reduced-network line. Utilization is `|transit| / capacity` in
//! percent. Only corridors that exist in the network enter the corridor
//! rankings and the session matrix.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::io::Write;
use std::ops::RangeInclusive;
use std::path::Path;

use super::{
    AnalysisError, NetworkLine, market_file, mean, opt_cell, read_network_lines, read_required,
    write_file,
};
use crate::io::input::read_table;
use crate::market::records::{TransitFlow, TransmissionLimit, ZonalPrice, session};

/// Morning peak hours.
pub const MORNING_HOURS: RangeInclusive<u32> = 7..=10;
/// Midday solar peak hours.
pub const MIDDAY_HOURS: RangeInclusive<u32> = 12..=15;

/// Corridors along the peninsula backbone; both directions are counted.
pub const NORTH_SOUTH_CORRIDORS: &[(&str, &str)] = &[
    ("NORD", "CNOR"),
    ("CNOR", "CSUD"),
    ("CSUD", "SUD"),
    ("SUD", "CALA"),
    ("NORD", "SVIZ"),
];

/// Zones averaged for the southern side of the price spread.
pub const SOUTH_ZONES: &[&str] = &["SUD", "CALA"];
/// Zone used for the northern side of the price spread.
pub const NORTH_ZONE: &str = "NORD";

/// `FROM-TO` corridor label.
pub fn corridor_label(from: &str, to: &str) -> String {
    format!("{}-{}", from.trim(), to.trim())
}

/// A transit record with its capacity and utilization.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowUtilization {
    pub corridor: String,
    pub hour: u32,
    pub period: u32,
    pub abs_flow: f64,
    /// Capacity used for this record (MW), if one was found.
    pub capacity: Option<f64>,
    /// Percent of capacity; `None` when no positive capacity was found.
    pub utilization: Option<f64>,
}

/// Where per-record capacities come from.
#[derive(Debug, Clone)]
pub enum CapacityBasis {
    /// Published limits keyed by (from, to, hour, period); the `from`
    /// direction limit is used.
    Measured(HashMap<(String, String, u32, u32), f64>),
    /// Network `s_nom` keyed by corridor, matched in either direction.
    Network(HashMap<(String, String), f64>),
}

impl CapacityBasis {
    pub fn measured(limits: &[TransmissionLimit]) -> Self {
        let mut map = HashMap::with_capacity(limits.len());
        for l in limits {
            map.entry((l.from.trim().to_string(), l.to.trim().to_string(), l.hour, l.period))
                .or_insert(l.limit_from);
        }
        Self::Measured(map)
    }

    /// First matching line wins for each unordered bus pair.
    pub fn network(lines: &[NetworkLine]) -> Self {
        let mut map = HashMap::with_capacity(lines.len());
        for l in lines {
            map.entry(unordered(&l.bus0, &l.bus1)).or_insert(l.s_nom);
        }
        Self::Network(map)
    }

    fn capacity(&self, flow: &TransitFlow) -> Option<f64> {
        let (from, to) = (flow.from.trim(), flow.to.trim());
        match self {
            Self::Measured(map) => map
                .get(&(from.to_string(), to.to_string(), flow.hour, flow.period))
                .copied(),
            Self::Network(map) => map.get(&unordered(from, to)).copied(),
        }
    }
}

fn unordered(a: &str, b: &str) -> (String, String) {
    let (a, b) = (a.trim(), b.trim());
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// Pairs every transit record with a capacity.
pub fn utilization(flows: &[TransitFlow], basis: &CapacityBasis) -> Vec<FlowUtilization> {
    flows
        .iter()
        .map(|f| {
            let capacity = basis.capacity(f);
            let abs_flow = f.transit.abs();
            FlowUtilization {
                corridor: corridor_label(&f.from, &f.to),
                hour: f.hour,
                period: f.period,
                abs_flow,
                capacity,
                utilization: capacity.filter(|c| *c > 0.0).map(|c| abs_flow / c * 100.0),
            }
        })
        .collect()
}

/// Both directions of every network line.
pub fn network_corridors(lines: &[NetworkLine]) -> HashSet<String> {
    lines
        .iter()
        .flat_map(|l| [corridor_label(&l.bus0, &l.bus1), corridor_label(&l.bus1, &l.bus0)])
        .collect()
}

/// Mean utilization of one corridor.
#[derive(Debug, Clone, PartialEq)]
pub struct CorridorAverage {
    pub corridor: String,
    pub mean_utilization: f64,
    /// Records with a utilization value.
    pub samples: usize,
}

/// North–south backbone activity in one hour.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyActivity {
    pub hour: u32,
    pub mean_abs_flow: f64,
    pub mean_utilization: Option<f64>,
}

/// South minus north price difference in one hour (EUR/MWh).
#[derive(Debug, Clone, PartialEq)]
pub struct HourlySpread {
    pub hour: u32,
    pub spread: f64,
}

/// Mean utilization of one corridor in one quarter-hour session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionCell {
    pub corridor: String,
    pub session: u32,
    pub mean_utilization: f64,
}

/// Ranking sizes for [`CongestionReport::build`].
#[derive(Debug, Clone, Copy)]
pub struct ReportLimits {
    /// Entries kept in the whole-day ranking.
    pub top_corridors: usize,
    /// Entries kept in the morning and midday rankings.
    pub top_window: usize,
}

impl Default for ReportLimits {
    fn default() -> Self {
        Self {
            top_corridors: 15,
            top_window: 10,
        }
    }
}

/// Full congestion report for one day.
#[derive(Debug, Clone, PartialEq)]
pub struct CongestionReport {
    /// Records kept after filtering to network corridors.
    pub network_records: usize,
    /// All transit records.
    pub total_records: usize,
    /// Whole-day ranking, highest first.
    pub corridors: Vec<CorridorAverage>,
    pub morning: Vec<CorridorAverage>,
    pub midday: Vec<CorridorAverage>,
    pub north_south: Vec<HourlyActivity>,
    pub price_spread: Vec<HourlySpread>,
    /// Long-form corridor × session matrix, sorted by corridor then session.
    pub sessions: Vec<SessionCell>,
}

impl CongestionReport {
    /// Builds the report.
    ///
    /// # Arguments
    ///
    /// * `flows` - Every transit record with its utilization
    /// * `corridors` - Corridor labels present in the network
    /// * `prices` - Zonal prices of the same day
    /// * `limits` - Ranking sizes
    pub fn build(
        flows: &[FlowUtilization],
        corridors: &HashSet<String>,
        prices: &[ZonalPrice],
        limits: ReportLimits,
    ) -> Self {
        let network: Vec<&FlowUtilization> = flows
            .iter()
            .filter(|f| corridors.contains(&f.corridor))
            .collect();

        let mut ranked = rank(network.iter().copied());
        ranked.truncate(limits.top_corridors);
        let mut morning = rank(network.iter().copied().filter(|f| MORNING_HOURS.contains(&f.hour)));
        morning.truncate(limits.top_window);
        let mut midday = rank(network.iter().copied().filter(|f| MIDDAY_HOURS.contains(&f.hour)));
        midday.truncate(limits.top_window);

        let mut cells: BTreeMap<(String, u32), Vec<f64>> = BTreeMap::new();
        for f in &network {
            if let Some(u) = f.utilization {
                cells
                    .entry((f.corridor.clone(), session(f.hour, f.period)))
                    .or_default()
                    .push(u);
            }
        }
        let sessions = cells
            .into_iter()
            .filter_map(|((corridor, session), values)| {
                mean(values).map(|mean_utilization| SessionCell {
                    corridor,
                    session,
                    mean_utilization,
                })
            })
            .collect();

        Self {
            network_records: network.len(),
            total_records: flows.len(),
            corridors: ranked,
            morning,
            midday,
            north_south: north_south_activity(flows),
            price_spread: price_spread(prices),
            sessions,
        }
    }

    /// Writes the report tables into `dir`.
    ///
    /// # Errors
    ///
    /// Returns an [`AnalysisError`] naming the first file that failed.
    pub fn write(&self, dir: &Path) -> Result<(), AnalysisError> {
        write_file(&dir.join("corridor_utilization.csv"), |w| {
            write_ranking(&self.corridors, w)
        })?;
        write_file(&dir.join("morning_top.csv"), |w| write_ranking(&self.morning, w))?;
        write_file(&dir.join("midday_top.csv"), |w| write_ranking(&self.midday, w))?;
        write_file(&dir.join("north_south_hourly.csv"), |w| {
            write_north_south(&self.north_south, w)
        })?;
        write_file(&dir.join("price_spread.csv"), |w| {
            write_spread(&self.price_spread, w)
        })?;
        write_file(&dir.join("session_matrix.csv"), |w| {
            write_session_matrix(&self.sessions, w)
        })?;
        Ok(())
    }
}

/// Mean utilization per corridor, highest first; ties keep label order.
fn rank<'a>(flows: impl Iterator<Item = &'a FlowUtilization>) -> Vec<CorridorAverage> {
    let mut groups: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for f in flows {
        if let Some(u) = f.utilization {
            groups.entry(f.corridor.as_str()).or_default().push(u);
        }
    }
    let mut out: Vec<CorridorAverage> = groups
        .into_iter()
        .filter_map(|(corridor, values)| {
            let samples = values.len();
            mean(values).map(|mean_utilization| CorridorAverage {
                corridor: corridor.to_string(),
                mean_utilization,
                samples,
            })
        })
        .collect();
    out.sort_by(|a, b| b.mean_utilization.total_cmp(&a.mean_utilization));
    out
}

fn is_north_south(corridor: &str) -> bool {
    NORTH_SOUTH_CORRIDORS.iter().any(|(a, b)| {
        corridor == corridor_label(a, b) || corridor == corridor_label(b, a)
    })
}

/// Hourly mean flow and utilization over the backbone corridors.
///
/// Uses every record, not only network corridors.
pub fn north_south_activity(flows: &[FlowUtilization]) -> Vec<HourlyActivity> {
    let mut hours: BTreeMap<u32, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for f in flows.iter().filter(|f| is_north_south(&f.corridor)) {
        let entry = hours.entry(f.hour).or_default();
        entry.0.push(f.abs_flow);
        if let Some(u) = f.utilization {
            entry.1.push(u);
        }
    }
    hours
        .into_iter()
        .filter_map(|(hour, (flows, utils))| {
            mean(flows).map(|mean_abs_flow| HourlyActivity {
                hour,
                mean_abs_flow,
                mean_utilization: mean(utils),
            })
        })
        .collect()
}

/// Mean of the southern zones minus the northern zone, per hour.
///
/// A side with no price in an hour contributes a spread of 0 for that hour.
pub fn price_spread(prices: &[ZonalPrice]) -> Vec<HourlySpread> {
    let mut north: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    let mut south: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for p in prices.iter().filter(|p| p.price.is_finite()) {
        let zone = p.zone.trim();
        if zone == NORTH_ZONE {
            north.entry(p.hour).or_default().push(p.price);
        } else if SOUTH_ZONES.contains(&zone) {
            south.entry(p.hour).or_default().push(p.price);
        }
    }
    let hours: BTreeSet<u32> = north.keys().chain(south.keys()).copied().collect();
    hours
        .into_iter()
        .map(|hour| {
            let n = north.get(&hour).and_then(|v| mean(v.iter().copied()));
            let s = south.get(&hour).and_then(|v| mean(v.iter().copied()));
            let spread = match (s, n) {
                (Some(s), Some(n)) => s - n,
                _ => 0.0,
            };
            HourlySpread { hour, spread }
        })
        .collect()
}

/// Writes a corridor ranking.
///
/// # Errors
///
/// Returns a `csv::Error` if writing fails.
pub fn write_ranking(rows: &[CorridorAverage], writer: impl Write) -> Result<(), csv::Error> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(["corridor", "mean_utilization_pct", "samples"])?;
    for r in rows {
        wtr.write_record(&[
            r.corridor.clone(),
            format!("{:.2}", r.mean_utilization),
            r.samples.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_north_south(rows: &[HourlyActivity], writer: impl Write) -> Result<(), csv::Error> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(["hour", "mean_abs_flow_mw", "mean_utilization_pct"])?;
    for r in rows {
        wtr.write_record(&[
            r.hour.to_string(),
            format!("{:.2}", r.mean_abs_flow),
            opt_cell(r.mean_utilization, 2),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_spread(rows: &[HourlySpread], writer: impl Write) -> Result<(), csv::Error> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(["hour", "south_minus_north_eur_mwh"])?;
    for r in rows {
        wtr.write_record(&[r.hour.to_string(), format!("{:.2}", r.spread)])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes the session matrix wide: one row per corridor, one column per
/// session seen in the data. Missing cells are empty.
///
/// # Errors
///
/// Returns a `csv::Error` if writing fails.
pub fn write_session_matrix(cells: &[SessionCell], writer: impl Write) -> Result<(), csv::Error> {
    let sessions: BTreeSet<u32> = cells.iter().map(|c| c.session).collect();
    let mut rows: BTreeMap<&str, HashMap<u32, f64>> = BTreeMap::new();
    for c in cells {
        rows.entry(c.corridor.as_str())
            .or_default()
            .insert(c.session, c.mean_utilization);
    }

    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    let header = std::iter::once("corridor".to_string()).chain(sessions.iter().map(u32::to_string));
    wtr.write_record(header)?;
    for (corridor, values) in &rows {
        let record = std::iter::once(corridor.to_string())
            .chain(sessions.iter().map(|s| opt_cell(values.get(s).copied(), 2)));
        wtr.write_record(record)?;
    }
    wtr.flush()?;
    Ok(())
}

impl fmt::Display for CongestionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Congestion Report ---")?;
        writeln!(
            f,
            "Flow records:          {} ({} on network corridors)",
            self.total_records, self.network_records
        )?;
        writeln!(f, "Top corridors (average utilization):")?;
        for c in &self.corridors {
            writeln!(f, "  {:<12} {:>7.1}%", c.corridor, c.mean_utilization)?;
        }
        writeln!(f, "Morning peak (07-10):")?;
        for c in &self.morning {
            writeln!(f, "  {:<12} {:>7.1}%", c.corridor, c.mean_utilization)?;
        }
        writeln!(f, "Midday peak (12-15):")?;
        for c in &self.midday {
            writeln!(f, "  {:<12} {:>7.1}%", c.corridor, c.mean_utilization)?;
        }
        let widest = self
            .price_spread
            .iter()
            .max_by(|a, b| a.spread.abs().total_cmp(&b.spread.abs()));
        match widest {
            Some(s) => write!(
                f,
                "Widest south-north spread: {:.2} EUR/MWh at hour {}",
                s.spread, s.hour
            ),
            None => write!(f, "Widest south-north spread: n/a"),
        }
    }
}

/// Runs the congestion analysis for one downloaded day.
///
/// Reads `MGP_ME_Transits_{date}.csv` and `MGP_ME_ZonalPrices_{date}.csv`
/// from `data_dir`. Capacities come from `MGP_ME_TransmissionLimits_{date}.csv`
/// when it exists and from the line table in `network_dir` otherwise. Without
/// a readable network every observed corridor is ranked.
///
/// # Errors
///
/// Returns an [`AnalysisError`] if the transit or price table is missing
/// or the transit table is empty.
pub fn analyze_day(
    data_dir: &Path,
    network_dir: &Path,
    date: &str,
    limits: ReportLimits,
) -> Result<CongestionReport, AnalysisError> {
    let transits: Vec<TransitFlow> =
        read_required(&market_file(data_dir, "MGP", "ME_Transits", date))?;
    let prices: Vec<ZonalPrice> =
        read_table(&market_file(data_dir, "MGP", "ME_ZonalPrices", date))?;

    let lines = read_network_lines(network_dir).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "network lines unavailable, ranking all corridors");
        Vec::new()
    });

    let limit_path = market_file(data_dir, "MGP", "ME_TransmissionLimits", date);
    let basis = if limit_path.exists() {
        let published: Vec<TransmissionLimit> = read_table(&limit_path)?;
        tracing::info!(rows = published.len(), "using published transmission limits");
        CapacityBasis::measured(&published)
    } else {
        tracing::info!("no published limits, using network s_nom");
        CapacityBasis::network(&lines)
    };

    let corridors = if lines.is_empty() {
        transits
            .iter()
            .map(|t| corridor_label(&t.from, &t.to))
            .collect()
    } else {
        network_corridors(&lines)
    };
    let flows = utilization(&transits, &basis);
    Ok(CongestionReport::build(&flows, &corridors, &prices, limits))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow(from: &str, to: &str, hour: u32, period: u32, transit: f64) -> TransitFlow {
        TransitFlow {
            from: from.into(),
            to: to.into(),
            hour,
            period,
            transit,
        }
    }

    fn line(bus0: &str, bus1: &str, s_nom: f64) -> NetworkLine {
        NetworkLine {
            bus0: bus0.into(),
            bus1: bus1.into(),
            s_nom,
        }
    }

    fn price(zone: &str, hour: u32, price: f64) -> ZonalPrice {
        ZonalPrice {
            flow_date: None,
            hour,
            period: 1,
            zone: zone.into(),
            price,
        }
    }

    #[test]
    fn network_capacity_matches_either_direction() {
        let basis = CapacityBasis::network(&[line("CNOR", "NORD", 2000.0)]);
        let out = utilization(&[flow("NORD", "CNOR", 8, 1, -500.0)], &basis);
        assert_eq!(out[0].capacity, Some(2000.0));
        assert_eq!(out[0].utilization, Some(25.0));
    }

    #[test]
    fn measured_capacity_is_directional_and_hourly() {
        let limits = vec![TransmissionLimit {
            from: "NORD".into(),
            to: "CNOR".into(),
            hour: 8,
            period: 1,
            limit_from: 1000.0,
            limit_to: 4000.0,
        }];
        let basis = CapacityBasis::measured(&limits);
        let out = utilization(
            &[flow("NORD", "CNOR", 8, 1, 800.0), flow("CNOR", "NORD", 8, 1, 800.0)],
            &basis,
        );
        assert_eq!(out[0].utilization, Some(80.0));
        assert_eq!(out[1].utilization, None);
    }

    #[test]
    fn zero_capacity_has_no_utilization() {
        let basis = CapacityBasis::network(&[line("NORD", "CNOR", 0.0)]);
        let out = utilization(&[flow("NORD", "CNOR", 1, 1, 10.0)], &basis);
        assert_eq!(out[0].capacity, Some(0.0));
        assert_eq!(out[0].utilization, None);
    }

    #[test]
    fn report_ranks_only_network_corridors() {
        let lines = vec![line("NORD", "CNOR", 1000.0), line("CSUD", "SUD", 1000.0)];
        let flows = vec![
            flow("NORD", "CNOR", 8, 1, 900.0),
            flow("NORD", "CNOR", 13, 1, 100.0),
            flow("CSUD", "SUD", 13, 2, 600.0),
            flow("NORD", "FRAN", 8, 1, 999.0),
        ];
        let mut all_lines = lines.clone();
        all_lines.push(line("NORD", "FRAN", 1000.0));
        let util = utilization(&flows, &CapacityBasis::network(&all_lines));
        let report = CongestionReport::build(
            &util,
            &network_corridors(&lines),
            &[],
            ReportLimits::default(),
        );

        assert_eq!(report.network_records, 3);
        assert_eq!(report.total_records, 4);
        assert_eq!(report.corridors[0].corridor, "CSUD-SUD");
        assert_eq!(report.corridors[1].corridor, "NORD-CNOR");
        assert_eq!(report.corridors[1].mean_utilization, 50.0);
        assert_eq!(report.morning.len(), 1);
        assert_eq!(report.morning[0].mean_utilization, 90.0);
        assert_eq!(report.midday[0].corridor, "CSUD-SUD");
        let cell = report
            .sessions
            .iter()
            .find(|c| c.corridor == "CSUD-SUD")
            .map(|c| c.session);
        assert_eq!(cell, Some(50));
    }

    #[test]
    fn north_south_counts_reverse_direction() {
        let flows = utilization(
            &[flow("CNOR", "NORD", 3, 1, 400.0), flow("SICI", "CALA", 3, 1, 100.0)],
            &CapacityBasis::network(&[line("NORD", "CNOR", 800.0)]),
        );
        let ns = north_south_activity(&flows);
        assert_eq!(ns.len(), 1);
        assert_eq!(ns[0].mean_abs_flow, 400.0);
        assert_eq!(ns[0].mean_utilization, Some(50.0));
    }

    #[test]
    fn price_spread_fills_missing_side_with_zero() {
        let prices = vec![
            price("NORD", 1, 100.0),
            price("SUD", 1, 90.0),
            price("CALA", 1, 80.0),
            price("SUD", 2, 70.0),
        ];
        let spread = price_spread(&prices);
        assert_eq!(spread.len(), 2);
        assert_eq!(spread[0].spread, -15.0);
        assert_eq!(spread[1].spread, 0.0);
    }

    #[test]
    fn session_matrix_is_wide() {
        let cells = vec![
            SessionCell {
                corridor: "A-B".into(),
                session: 1,
                mean_utilization: 10.0,
            },
            SessionCell {
                corridor: "C-D".into(),
                session: 2,
                mean_utilization: 20.0,
            },
        ];
        let mut buf = Vec::new();
        write_session_matrix(&cells, &mut buf).ok();
        let text = String::from_utf8(buf).unwrap_or_default();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, ["corridor,1,2", "A-B,10.00,", "C-D,,20.00"]);
    }
}
