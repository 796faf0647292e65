use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use gme_grid::forecast::{DEFAULT_DAYS, MAX_FORECAST_DAYS};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Italian electricity market data and grid aggregation toolkit", long_about = None)]
pub struct Cli {
    /// Default logging level; `RUST_LOG` directives refine it
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reduce a transmission grid to an aggregated network
    Aggregate {
        /// TOML configuration file
        #[arg(long, conflicts_with = "preset")]
        config: Option<PathBuf>,
        /// Built-in preset (italy_30, gme_zonal)
        #[arg(long)]
        preset: Option<String>,
        /// Override the clustering seed
        #[arg(long)]
        seed: Option<u64>,
        /// Override the output directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Download one day of market tables as CSV
    Fetch {
        /// Market day (YYYY-MM-DD); defaults to yesterday
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Directory the CSVs are written to
        #[arg(short, long, default_value = "data")]
        output: PathBuf,
    },
    /// Print the remaining API allowance
    Quotas,
    /// Corridor congestion analysis of one downloaded day
    Congestion {
        /// Market day (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        /// Directory holding the downloaded CSVs
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
        /// Aggregated zonal network directory
        #[arg(long, default_value = "data_pypsa_eur_zonal")]
        network: PathBuf,
        #[arg(short, long, default_value = "analysis")]
        output: PathBuf,
        /// Corridors kept in the whole-day ranking
        #[arg(long, default_value_t = 15)]
        top: usize,
    },
    /// MSD and MB balancing analysis of one downloaded day
    Balancing {
        /// Market day (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
        #[arg(short, long, default_value = "analysis")]
        output: PathBuf,
    },
    /// Map one hour of zonal prices onto network buses
    Prices {
        /// Market day (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        /// Hour of day, 1-24
        #[arg(long, default_value_t = 12, value_parser = clap::value_parser!(u32).range(1..=24))]
        hour: u32,
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
        #[arg(long, default_value = "data_pypsa_eur_zonal")]
        network: PathBuf,
        #[arg(short, long, default_value = "analysis")]
        output: PathBuf,
    },
    /// Forecast hourly prices from a history CSV (date, interval, price)
    Forecast {
        #[arg(long)]
        history: PathBuf,
        /// Days to forecast
        #[arg(long, default_value_t = DEFAULT_DAYS, value_parser = parse_days)]
        days: usize,
        /// Write the forecast here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = ForecastModel::Ridge)]
        model: ForecastModel,
    },
    /// Serve the REST API
    #[cfg(feature = "api")]
    Serve {
        #[arg(long, default_value_t = 3000)]
        port: u16,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ForecastModel {
    /// Ridge regression over calendar and lag features
    Ridge,
    /// Repeat the last observed day
    Naive,
}

fn parse_days(s: &str) -> Result<usize, String> {
    let days: usize = s.parse().map_err(|e| format!("{e}"))?;
    if (1..=MAX_FORECAST_DAYS).contains(&days) {
        Ok(days)
    } else {
        Err(format!("must be between 1 and {MAX_FORECAST_DAYS}"))
    }
}

/// Log filter from `--log-level` plus any `RUST_LOG`-style directives.
///
/// Unparseable directives are ignored.
pub fn log_filter(level: tracing::Level, directives: &str) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .parse_lossy(directives)
}
