//! Loading of topology, demand, and market tables from CSV.
//!
//! Headers are trimmed and lowercased before deserialization, so column
//! names match regardless of the casing used by the data source. Rows that
//! cannot be deserialized at all are skipped with a warning.

use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::InputError;
use crate::grid::types::{DemandSeries, Generator, Substation, TransmissionLine};
use crate::grid::zones::RegionPolygons;

/// Column names tried, in order, for the demand value.
const DEMAND_COLUMNS: &[&str] = &["demand_mw", "demand", "load_mw", "load"];

/// Raw inputs of one aggregation run.
#[derive(Debug, Clone, Default)]
pub struct RawTopology {
    pub substations: Vec<Substation>,
    pub lines: Vec<TransmissionLine>,
    pub generators: Vec<Generator>,
    pub demand: DemandSeries,
}

/// Reads every row of a CSV file into `T`.
///
/// # Errors
///
/// Returns [`InputError::Missing`] if the file does not exist and
/// [`InputError::Csv`] if the header row cannot be read.
pub fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, InputError> {
    let file = open(path)?;
    read_table_from(file, path)
}

/// Like [`read_table`] but from any reader; `origin` names the source in
/// errors and logs.
///
/// # Errors
///
/// Returns [`InputError::Csv`] if the header row cannot be read.
pub fn read_table_from<T: DeserializeOwned>(
    reader: impl Read,
    origin: &Path,
) -> Result<Vec<T>, InputError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers().map_err(|source| InputError::Csv {
        path: origin.to_path_buf(),
        source,
    })?;
    let lowered: csv::StringRecord = headers.iter().map(str::to_ascii_lowercase).collect();
    rdr.set_headers(lowered);

    let mut rows = Vec::new();
    let mut skipped = 0_usize;
    for (i, result) in rdr.deserialize::<T>().enumerate() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) => {
                skipped += 1;
                tracing::debug!(file = %origin.display(), row = i + 1, error = %e, "skipping row");
            }
        }
    }
    if skipped > 0 {
        tracing::warn!(file = %origin.display(), skipped, "skipped malformed rows");
    }
    Ok(rows)
}

/// Reads an hourly demand table: first column is the timestamp, the value
/// column is the first of `demand_mw`, `demand`, `load_mw`, `load`, or else
/// the second column. Unparsable values read as 0.
///
/// # Errors
///
/// Returns an [`InputError`] if the file is missing or not valid CSV.
pub fn read_demand(path: &Path) -> Result<DemandSeries, InputError> {
    let file = open(path)?;
    let csv_err = |source| InputError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(file);
    let headers = rdr.headers().map_err(csv_err)?.clone();
    let value_col = DEMAND_COLUMNS
        .iter()
        .find_map(|name| {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
        })
        .unwrap_or(1);

    let mut series = DemandSeries::default();
    for record in rdr.records() {
        let record = record.map_err(csv_err)?;
        let Some(ts) = record.get(0) else {
            continue;
        };
        let value = record
            .get(value_col)
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .unwrap_or(0.0);
        series.timestamps.push(ts.to_string());
        series.demand_mw.push(value);
    }
    Ok(series)
}

/// Reads a GeoJSON file of named region polygons.
///
/// # Errors
///
/// Returns an [`InputError`] if the file is missing, unreadable, or not a
/// feature collection.
pub fn read_regions(path: &Path) -> Result<RegionPolygons, InputError> {
    if !path.exists() {
        return Err(InputError::Missing(path.to_path_buf()));
    }
    let text = fs::read_to_string(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    RegionPolygons::from_geojson_str(&text).map_err(|source| InputError::GeoJson {
        path: path.to_path_buf(),
        source,
    })
}

/// Paths of the four topology tables.
#[derive(Debug, Clone, Copy)]
pub struct TopologyPaths<'a> {
    pub substations: &'a Path,
    pub lines: &'a Path,
    pub generators: &'a Path,
    pub demand: &'a Path,
}

/// Loads all four topology tables.
///
/// # Errors
///
/// Fails on the first missing or unreadable table.
pub fn load_topology(paths: TopologyPaths<'_>) -> Result<RawTopology, InputError> {
    let topology = RawTopology {
        substations: read_table(paths.substations)?,
        lines: read_table(paths.lines)?,
        generators: read_table(paths.generators)?,
        demand: read_demand(paths.demand)?,
    };
    tracing::info!(
        substations = topology.substations.len(),
        lines = topology.lines.len(),
        generators = topology.generators.len(),
        demand_hours = topology.demand.len(),
        "loaded topology"
    );
    Ok(topology)
}

fn open(path: &Path) -> Result<File, InputError> {
    if !path.exists() {
        return Err(InputError::Missing(path.to_path_buf()));
    }
    File::open(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })
}
