//! Error types for input loading, network reduction, and analysis.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::grid::zones::RegionParseError;

/// Failure to read one of the input tables.
#[derive(Debug, Error)]
pub enum InputError {
    /// The file does not exist.
    #[error("input file not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed CSV in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("malformed GeoJSON in {}: {source}", path.display())]
    GeoJson {
        path: PathBuf,
        #[source]
        source: RegionParseError,
    },
}

/// Failure while reducing the topology.
#[derive(Debug, Error)]
pub enum ReduceError {
    /// No substation survived the voltage and coordinate filters.
    #[error("no substations left after filtering (min voltage {min_voltage_kv} kV)")]
    NoSubstations { min_voltage_kv: f64 },

    /// Fewer points than requested clusters.
    #[error("cannot form {k} clusters from {n} substations")]
    TooFewPoints { k: usize, n: usize },

    /// Zone mapping needs at least one region polygon or neighbour point.
    #[error("zone mapping has no regions or neighbour points to assign to")]
    NoZones,
}

/// Failure while writing result tables.
#[derive(Debug, Error)]
pub enum OutputError {
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

/// Any failure of a full pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Reduce(#[from] ReduceError),

    #[error(transparent)]
    Output(#[from] OutputError),
}
