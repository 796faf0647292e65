//! gme-grid entry point: CLI wiring for aggregation, downloads, analysis,
//! forecasting, and the API server.

mod cli;

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::{Days, Local, NaiveDate};
use clap::Parser;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cli::{Cli, Commands, ForecastModel};
use gme_grid::analysis::balancing;
use gme_grid::analysis::congestion::{self, ReportLimits};
use gme_grid::analysis::prices::{self, write_bus_prices};
use gme_grid::config::AggregationConfig;
use gme_grid::forecast::{
    Forecaster, HistoryPoint, MIN_HISTORY, RidgeForecaster, SeasonalNaive, write_forecast,
};
use gme_grid::grid::pipeline;
use gme_grid::io::input::read_table;
use gme_grid::market::client::{
    Credentials, DataRequest, GmeClient, UreqTransport, base_url_from_env,
};

/// Tables downloaded by `fetch`, as `(segment, data set, label)`.
const DAILY_DOWNLOADS: &[(&str, &str, &str)] = &[
    ("MGP", "ME_ZonalPrices", "MGP zonal prices"),
    ("MGP", "ME_TransmissionLimits", "MGP transmission limits"),
    ("MB", "ME_ZonalPrices", "MB zonal prices"),
    ("MSD", "ME_ZonalPrices", "MSD zonal prices"),
    ("MGP", "ME_Transits", "MGP transit flows"),
    ("MSD", "ME_MSDExAnteResults", "MSD ex-ante results"),
];

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let directives = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(cli::log_filter(cli.log_level, &directives))
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install tracing subscriber")?;

    match cli.command {
        Commands::Aggregate {
            config,
            preset,
            seed,
            output,
        } => aggregate(config.as_deref(), preset.as_deref(), seed, output),
        Commands::Fetch { date, output } => fetch(date, &output),
        Commands::Quotas => quotas(),
        Commands::Congestion {
            date,
            data_dir,
            network,
            output,
            top,
        } => {
            let limits = ReportLimits {
                top_corridors: top,
                ..ReportLimits::default()
            };
            let report = congestion::analyze_day(&data_dir, &network, &day(date), limits)?;
            report.write(&output)?;
            println!("{report}");
            eprintln!("Congestion tables written to {}", output.display());
            Ok(())
        }
        Commands::Balancing {
            date,
            data_dir,
            output,
        } => {
            let report = balancing::analyze_day(&data_dir, &day(date))?;
            report.write(&output)?;
            println!("{report}");
            eprintln!("Balancing tables written to {}", output.display());
            Ok(())
        }
        Commands::Prices {
            date,
            hour,
            data_dir,
            network,
            output,
        } => {
            let date = day(date);
            let rows = prices::analyze_hour(&data_dir, &network, &date, hour)?;
            let path = output.join(format!("bus_prices_{date}_h{hour:02}.csv"));
            write_csv(&path, |w| write_bus_prices(&rows, w))?;
            let priced = rows.iter().filter(|r| r.price.is_some()).count();
            eprintln!("{priced}/{} buses priced, written to {}", rows.len(), path.display());
            Ok(())
        }
        Commands::Forecast {
            history,
            days,
            output,
            model,
        } => forecast(&history, days, output.as_deref(), model),
        #[cfg(feature = "api")]
        Commands::Serve { port } => serve(port),
    }
}

fn day(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn aggregate(
    config_path: Option<&Path>,
    preset: Option<&str>,
    seed: Option<u64>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    // --config takes priority, then --preset, then the italy_30 default
    let mut config = match (config_path, preset) {
        (Some(path), _) => AggregationConfig::from_toml_file(path)?,
        (None, Some(name)) => AggregationConfig::from_preset(name)?,
        (None, None) => AggregationConfig::italy_30(),
    };
    if let Some(seed) = seed {
        config.reduction.seed = seed;
    }
    if let Some(dir) = output {
        config.output.dir = dir;
    }

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        bail!("invalid configuration ({} errors)", errors.len());
    }

    let network = pipeline::run(&config)?;
    println!("{}", network.summary);
    eprintln!("Aggregated network written to {}", config.output.dir.display());
    Ok(())
}

fn client_from_env() -> anyhow::Result<GmeClient> {
    let Some(credentials) = Credentials::from_env() else {
        bail!("GME_USERNAME and GME_PASSWORD must be set");
    };
    Ok(GmeClient::with_transport(
        credentials,
        &base_url_from_env(),
        Arc::new(UreqTransport::new()),
    ))
}

fn fetch(date: Option<NaiveDate>, output: &Path) -> anyhow::Result<()> {
    let date = match date {
        Some(d) => d,
        None => Local::now()
            .date_naive()
            .checked_sub_days(Days::new(1))
            .context("cannot compute yesterday's date")?,
    };
    let mut client = client_from_env()?;
    client.login()?;

    println!("--- GME Data Fetch ({}) ---", day(date));
    for (segment, data_name, label) in DAILY_DOWNLOADS {
        let request = DataRequest::new(data_name, segment, date, date);
        match client.fetch_and_save_csv(&request, output)? {
            Some(path) => println!("  [ok]     {label}: {}", path.display()),
            None => println!("  [failed] {label}"),
        }
    }

    if let Some(quotas) = client.quotas()? {
        println!("\nRemaining quotas: {quotas}");
    }
    Ok(())
}

fn quotas() -> anyhow::Result<()> {
    let mut client = client_from_env()?;
    match client.quotas()? {
        Some(q) => println!("{}", serde_json::to_string_pretty(&q)?),
        None => bail!("quota request returned no data"),
    }
    Ok(())
}

fn forecast(
    history_path: &Path,
    days: usize,
    output: Option<&Path>,
    model: ForecastModel,
) -> anyhow::Result<()> {
    let history: Vec<HistoryPoint> = read_table(history_path)?;
    let points = match model {
        ForecastModel::Ridge => RidgeForecaster::default().forecast(&history, days),
        ForecastModel::Naive => SeasonalNaive.forecast(&history, days),
    };
    if points.is_empty() {
        bail!(
            "no forecast produced from {} history rows; at least {} are needed",
            history.len(),
            MIN_HISTORY
        );
    }
    match output {
        Some(path) => {
            write_csv(path, |w| write_forecast(&points, w))?;
            eprintln!("{} forecast points written to {}", points.len(), path.display());
        }
        None => write_forecast(&points, io::stdout().lock())?,
    }
    Ok(())
}

fn write_csv(
    path: &Path,
    write: impl FnOnce(BufWriter<File>) -> Result<(), csv::Error>,
) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    write(BufWriter::new(file)).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(feature = "api")]
fn serve(port: u16) -> anyhow::Result<()> {
    use std::net::SocketAddr;

    let state = Arc::new(gme_grid::api::AppState::from_env());
    if state.credentials.is_none() {
        tracing::warn!("GME credentials not set; /api/price-data will fail");
    }
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let rt = tokio::runtime::Runtime::new().context("failed to create tokio runtime")?;
    rt.block_on(gme_grid::api::serve(state, addr))
        .with_context(|| format!("API server on {addr} failed"))
}
