//! CSV export of the aggregated network tables.
//!
//! Each table has an `export_*` function writing to a path and a `write_*`
//! function writing to any [`Write`], so tests can render into memory.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use crate::error::OutputError;
use crate::grid::pipeline::AggregatedNetwork;
use crate::grid::types::{
    AggregateEdge, AggregateGenerator, AggregateNode, LoadProfiles, NetworkSummary,
};

pub const BUSES_FILE: &str = "buses.csv";
pub const LINES_FILE: &str = "lines.csv";
pub const GENERATORS_FILE: &str = "generators.csv";
pub const LOAD_FILE: &str = "load_profiles.csv";
pub const SUMMARY_FILE: &str = "summary.csv";

const BUSES_HEADER: &[&str] = &[
    "bus_id",
    "lat",
    "lon",
    "region",
    "n_substations",
    "max_voltage_kv",
    "load_weight",
];

const LINES_HEADER: &[&str] = &[
    "line_id",
    "bus0",
    "bus1",
    "voltage_kv",
    "length_km",
    "s_nom",
    "x",
    "n_lines",
    "kind",
    "capacity_origin",
];

const GENERATORS_HEADER: &[&str] = &["gen_id", "bus", "carrier", "p_nom", "marginal_cost", "n_units"];

const SUMMARY_HEADER: &[&str] = &[
    "n_buses",
    "n_lines",
    "n_generators",
    "total_gen_capacity_mw",
    "total_line_capacity_mw",
    "peak_demand_mw",
];

/// Writes all five result tables into `dir`, creating it if needed.
///
/// # Errors
///
/// Returns an [`OutputError`] naming the first file that could not be
/// written.
pub fn write_network(net: &AggregatedNetwork, dir: &Path) -> Result<(), OutputError> {
    fs::create_dir_all(dir).map_err(|source| OutputError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    export_with(&dir.join(BUSES_FILE), |w| {
        write_buses(&net.nodes, &net.load.weights, w)
    })?;
    export_with(&dir.join(LINES_FILE), |w| write_lines(&net.edges, w))?;
    export_with(&dir.join(GENERATORS_FILE), |w| {
        write_generators(&net.generators, w)
    })?;
    export_with(&dir.join(LOAD_FILE), |w| write_load(&net.load, w))?;
    export_with(&dir.join(SUMMARY_FILE), |w| write_summary(&net.summary, w))?;
    Ok(())
}

fn export_with(
    path: &Path,
    write: impl FnOnce(io::BufWriter<File>) -> Result<(), csv::Error>,
) -> Result<(), OutputError> {
    let file = File::create(path).map_err(|source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    write(io::BufWriter::new(file)).map_err(|source| OutputError::Csv {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes the bus table.
///
/// # Arguments
///
/// * `nodes` - Aggregate nodes, in output order
/// * `weights` - Load share per node, parallel to `nodes`
/// * `writer` - Destination implementing `Write`
///
/// # Errors
///
/// Returns a `csv::Error` if writing fails.
pub fn write_buses(
    nodes: &[AggregateNode],
    weights: &[f64],
    writer: impl Write,
) -> Result<(), csv::Error> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(BUSES_HEADER)?;
    for (i, n) in nodes.iter().enumerate() {
        wtr.write_record(&[
            n.id.clone(),
            format!("{:.6}", n.coord.lat),
            format!("{:.6}", n.coord.lon),
            n.region.clone().unwrap_or_default(),
            n.n_substations.to_string(),
            format!("{:.1}", n.max_voltage_kv),
            format!("{:.6}", weights.get(i).copied().unwrap_or(0.0)),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes the line table.
///
/// # Errors
///
/// Returns a `csv::Error` if writing fails.
pub fn write_lines(edges: &[AggregateEdge], writer: impl Write) -> Result<(), csv::Error> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(LINES_HEADER)?;
    for e in edges {
        wtr.write_record(&[
            e.id.clone(),
            e.bus0.clone(),
            e.bus1.clone(),
            format!("{:.1}", e.voltage_kv),
            format!("{:.3}", e.length_km),
            format!("{:.1}", e.s_nom),
            format!("{:.6}", e.x),
            e.n_lines.to_string(),
            e.kind.to_string(),
            e.capacity_origin.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes the generator table.
///
/// # Errors
///
/// Returns a `csv::Error` if writing fails.
pub fn write_generators(
    generators: &[AggregateGenerator],
    writer: impl Write,
) -> Result<(), csv::Error> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(GENERATORS_HEADER)?;
    for g in generators {
        wtr.write_record(&[
            g.id.clone(),
            g.bus.clone(),
            g.carrier.clone(),
            format!("{:.3}", g.p_nom),
            format!("{:.2}", g.marginal_cost),
            g.n_units.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes the hours × buses load matrix with a leading `timestamp` column.
///
/// # Errors
///
/// Returns a `csv::Error` if writing fails.
pub fn write_load(load: &LoadProfiles, writer: impl Write) -> Result<(), csv::Error> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    let header = std::iter::once("timestamp").chain(load.bus_ids.iter().map(String::as_str));
    wtr.write_record(header)?;
    for (ts, row) in load.timestamps.iter().zip(&load.rows) {
        let cells = std::iter::once(ts.clone()).chain(row.iter().map(|v| format!("{v:.3}")));
        wtr.write_record(cells)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes the one-row summary table.
///
/// # Errors
///
/// Returns a `csv::Error` if writing fails.
pub fn write_summary(summary: &NetworkSummary, writer: impl Write) -> Result<(), csv::Error> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(SUMMARY_HEADER)?;
    wtr.write_record(&[
        summary.n_buses.to_string(),
        summary.n_lines.to_string(),
        summary.n_generators.to_string(),
        format!("{:.1}", summary.total_gen_capacity_mw),
        format!("{:.1}", summary.total_line_capacity_mw),
        format!("{:.1}", summary.peak_demand_mw),
    ])?;
    wtr.flush()?;
    Ok(())
}
