//! Post-hoc analysis of downloaded market tables against a reduced network.

pub mod balancing;
pub mod congestion;
/// Zonal price mapping onto network buses.
pub mod prices;

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::error::InputError;
use crate::io::input::read_table;
use crate::io::lenient;

/// Failure of an analysis command.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Input(#[from] InputError),

    /// A table the analysis needs had no usable rows.
    #[error("no usable rows in {}", .0.display())]
    Empty(PathBuf),

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write CSV {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// One row of a reduced network's `lines.csv`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NetworkLine {
    pub bus0: String,
    pub bus1: String,
    #[serde(default, deserialize_with = "lenient::f64_or_zero")]
    pub s_nom: f64,
}

/// One row of a reduced network's `buses.csv`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NetworkBus {
    pub bus_id: String,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub lon: Option<f64>,
}

/// Reads the line table of a reduced network directory.
///
/// # Errors
///
/// Returns an [`InputError`] if `lines.csv` is missing or unreadable.
pub fn read_network_lines(dir: &Path) -> Result<Vec<NetworkLine>, InputError> {
    read_table(&dir.join(crate::io::export::LINES_FILE))
}

/// Reads the bus table of a reduced network directory.
///
/// # Errors
///
/// Returns an [`InputError`] if `buses.csv` is missing or unreadable.
pub fn read_network_buses(dir: &Path) -> Result<Vec<NetworkBus>, InputError> {
    read_table(&dir.join(crate::io::export::BUSES_FILE))
}

/// `{dir}/{segment}_{data_name}_{date}.csv`, the name downloads are saved
/// under.
pub fn market_file(dir: &Path, segment: &str, data_name: &str, date: &str) -> PathBuf {
    dir.join(format!("{segment}_{data_name}_{date}.csv"))
}

/// Reads a required market table that must hold at least one row.
pub(crate) fn read_required<T: serde::de::DeserializeOwned>(
    path: &Path,
) -> Result<Vec<T>, AnalysisError> {
    let rows: Vec<T> = read_table(path)?;
    if rows.is_empty() {
        return Err(AnalysisError::Empty(path.to_path_buf()));
    }
    Ok(rows)
}

/// Creates `path` and hands a buffered writer to `write`.
pub(crate) fn write_file(
    path: &Path,
    write: impl FnOnce(io::BufWriter<File>) -> Result<(), csv::Error>,
) -> Result<(), AnalysisError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| AnalysisError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let file = File::create(path).map_err(|source| AnalysisError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    write(io::BufWriter::new(file)).map_err(|source| AnalysisError::Csv {
        path: path.to_path_buf(),
        source,
    })
}

/// Formats an optional number as a CSV cell, empty when absent.
pub(crate) fn opt_cell(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(String::new, |v| format!("{v:.precision$}"))
}

/// Arithmetic mean, `None` for an empty input.
pub(crate) fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values
        .into_iter()
        .fold((0.0, 0_usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_empty_is_none() {
        assert_eq!(mean(Vec::<f64>::new()), None);
        assert_eq!(mean([1.0, 2.0, 6.0]), Some(3.0));
    }

    #[test]
    fn optional_cells_render_blank() {
        assert_eq!(opt_cell(None, 2), "");
        assert_eq!(opt_cell(Some(1.234), 1), "1.2");
    }
}
