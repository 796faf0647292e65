//! Day-ahead price forecasting from hourly history.
//!
//! History rows are `(date, interval, price)` with intervals 1–24. Two
//! [`Forecaster`]s are provided: [`RidgeForecaster`], a ridge-regularised
//! linear model over calendar, lag, and rolling-window features, and
//! [`SeasonalNaive`], which repeats the most recent day.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use chrono::{Datelike, Days, NaiveDate, Weekday};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Fewer history points than this yield an empty forecast.
pub const MIN_HISTORY: usize = 72;
/// Fewer complete training rows than this yield an empty forecast.
pub const MIN_TRAINING_ROWS: usize = 24;
/// Forecast horizon when none is given (days).
pub const DEFAULT_DAYS: usize = 2;
/// Longest horizon either forecaster produces (days).
pub const MAX_FORECAST_DAYS: usize = 31;
/// Per-interval lags, in days.
pub const LAGS: [usize; 6] = [1, 2, 3, 6, 12, 24];
/// Rolling window length, in days.
pub const WINDOW: usize = 24;

const INTERVALS: u32 = 24;

/// Number of forecast values for `days`, or `None` past [`MAX_FORECAST_DAYS`].
fn horizon(days: usize) -> Option<usize> {
    if days > MAX_FORECAST_DAYS {
        tracing::warn!(days, max = MAX_FORECAST_DAYS, "forecast horizon too long");
        return None;
    }
    days.checked_mul(INTERVALS as usize)
}

/// One historical price observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    /// `YYYY-MM-DD`; a longer timestamp or compact `yyyyMMdd` also parses.
    pub date: String,
    /// Hour of day, 1–24. Missing values are inferred from row position.
    #[serde(default)]
    pub interval: Option<u32>,
    #[serde(deserialize_with = "crate::io::lenient::f64_or_nan")]
    pub price: f64,
}

/// One forecast value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// `YYYY-MM-DD`.
    pub date: String,
    pub interval: u32,
    pub price: f64,
    /// Always `"forecast"`.
    #[serde(rename = "type")]
    pub kind: String,
}

impl ForecastPoint {
    fn new(date: NaiveDate, interval: u32, price: f64) -> Self {
        Self {
            date: date.format("%Y-%m-%d").to_string(),
            interval,
            price,
            kind: "forecast".to_string(),
        }
    }
}

/// Strategy interface for price forecasting.
pub trait Forecaster {
    /// Forecasts `days` full days after the last history date.
    ///
    /// Returns an empty vector when the history is too short or `days`
    /// exceeds [`MAX_FORECAST_DAYS`].
    fn forecast(&self, history: &[HistoryPoint], days: usize) -> Vec<ForecastPoint>;
}

/// A parsed, ordered observation.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Observation {
    date: NaiveDate,
    interval: u32,
    price: f64,
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let head = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(head, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y%m%d"))
        .ok()
}

/// Parses and sorts the history; rows with bad dates or prices are dropped.
fn observations(history: &[HistoryPoint]) -> Vec<Observation> {
    let mut out: Vec<Observation> = history
        .iter()
        .enumerate()
        .filter_map(|(i, h)| {
            let date = parse_date(&h.date)?;
            let interval = h
                .interval
                .filter(|v| (1..=INTERVALS).contains(v))
                .unwrap_or((i as u32 % INTERVALS) + 1);
            h.price.is_finite().then_some(Observation {
                date,
                interval,
                price: h.price,
            })
        })
        .collect();
    out.sort_by_key(|o| (o.date, o.interval));
    out
}

/// Prices per interval, in date order.
fn series_by_interval(obs: &[Observation]) -> BTreeMap<u32, Vec<f64>> {
    let mut series: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for o in obs {
        series.entry(o.interval).or_default().push(o.price);
    }
    series
}

/// Italian public holidays, including Easter Sunday and Monday.
pub fn is_italian_holiday(date: NaiveDate) -> bool {
    const FIXED: &[(u32, u32)] = &[
        (1, 1),
        (1, 6),
        (4, 25),
        (5, 1),
        (6, 2),
        (8, 15),
        (11, 1),
        (12, 8),
        (12, 25),
        (12, 26),
    ];
    if FIXED.contains(&(date.month(), date.day())) {
        return true;
    }
    easter_sunday(date.year()).is_some_and(|easter| {
        date == easter || easter.checked_add_days(Days::new(1)) == Some(date)
    })
}

/// Gregorian Easter Sunday (anonymous Gregorian algorithm).
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

/// Calendar features of one (date, interval) slot.
fn calendar_features(date: NaiveDate, interval: u32) -> Vec<f64> {
    let hour = f64::from(interval.saturating_sub(1));
    let dow = f64::from(date.weekday().num_days_from_monday());
    let month = f64::from(date.month());
    let quarter = f64::from((date.month() - 1) / 3 + 1);
    let weekend = matches!(date.weekday(), Weekday::Sat | Weekday::Sun);
    let holiday = is_italian_holiday(date);
    vec![
        hour,
        dow,
        month,
        f64::from(date.year()),
        quarter,
        (2.0 * PI * hour / 24.0).sin(),
        (2.0 * PI * hour / 24.0).cos(),
        (2.0 * PI * dow / 7.0).sin(),
        (2.0 * PI * dow / 7.0).cos(),
        (2.0 * PI * month / 12.0).sin(),
        (2.0 * PI * month / 12.0).cos(),
        f64::from(u8::from(weekend)),
        f64::from(u8::from(holiday)),
        f64::from(u8::from(weekend || holiday)),
    ]
}

/// Lag, rolling, and change features from the prices of the same interval
/// on earlier days, most recent last.
///
/// Returns `None` until `prior` covers the longest lag.
fn history_features(prior: &[f64]) -> Option<Vec<f64>> {
    let n = prior.len();
    if n < WINDOW.max(LAGS[LAGS.len() - 1]) {
        return None;
    }
    let lag = |k: usize| prior[n - k];
    let window = &prior[n - WINDOW..];
    let mean = window.iter().sum::<f64>() / WINDOW as f64;
    let var = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (WINDOW - 1) as f64;
    let min = window.iter().copied().fold(f64::INFINITY, f64::min);
    let max = window.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let change = |from: f64| if from != 0.0 { (lag(1) - from) / from } else { 0.0 };

    let mut out: Vec<f64> = LAGS.iter().map(|&k| lag(k)).collect();
    out.extend([mean, var.sqrt(), min, max, change(lag(2)), change(lag(24))]);
    Some(out)
}

fn features(date: NaiveDate, interval: u32, prior: &[f64]) -> Option<Vec<f64>> {
    let mut row = calendar_features(date, interval);
    row.extend(history_features(prior)?);
    Some(row)
}

/// Ridge-regularised linear regression on standardized features.
///
/// Predictions are recursive: each forecast value joins the history of its
/// interval before the next day is predicted.
#[derive(Debug, Clone, Copy)]
pub struct RidgeForecaster {
    /// L2 penalty on standardized coefficients.
    pub lambda: f64,
}

impl Default for RidgeForecaster {
    fn default() -> Self {
        Self { lambda: 1.0 }
    }
}

/// A fitted linear model.
#[derive(Debug, Clone)]
struct RidgeModel {
    means: Vec<f64>,
    scales: Vec<f64>,
    intercept: f64,
    weights: DVector<f64>,
}

impl RidgeModel {
    fn fit(rows: &[Vec<f64>], targets: &[f64], lambda: f64) -> Option<Self> {
        let n = rows.len();
        let p = rows.first()?.len();
        let mut means = vec![0.0; p];
        let mut scales = vec![1.0; p];
        for j in 0..p {
            let m = rows.iter().map(|r| r[j]).sum::<f64>() / n as f64;
            let var = rows.iter().map(|r| (r[j] - m).powi(2)).sum::<f64>() / n as f64;
            means[j] = m;
            if var > 1e-12 {
                scales[j] = var.sqrt();
            }
        }
        let y_mean = targets.iter().sum::<f64>() / n as f64;

        let x = DMatrix::from_fn(n, p, |i, j| (rows[i][j] - means[j]) / scales[j]);
        let y = DVector::from_iterator(n, targets.iter().map(|t| t - y_mean));
        let xt = x.transpose();
        let gram = &xt * &x + DMatrix::identity(p, p) * lambda;
        let weights = gram.cholesky()?.solve(&(&xt * &y));

        Some(Self {
            means,
            scales,
            intercept: y_mean,
            weights,
        })
    }

    fn predict(&self, row: &[f64]) -> f64 {
        row.iter()
            .enumerate()
            .map(|(j, v)| (v - self.means[j]) / self.scales[j] * self.weights[j])
            .sum::<f64>()
            + self.intercept
    }
}

impl Forecaster for RidgeForecaster {
    fn forecast(&self, history: &[HistoryPoint], days: usize) -> Vec<ForecastPoint> {
        if history.len() < MIN_HISTORY || horizon(days).is_none() {
            return Vec::new();
        }
        let obs = observations(history);
        let Some(last_date) = obs.last().map(|o| o.date) else {
            return Vec::new();
        };
        let mut series = series_by_interval(&obs);

        // Training rows: every observation with a full lag window behind it.
        let mut seen: BTreeMap<u32, usize> = BTreeMap::new();
        let mut rows = Vec::new();
        let mut targets = Vec::new();
        for o in &obs {
            let idx = seen.entry(o.interval).or_default();
            let prior = &series[&o.interval][..*idx];
            if let Some(row) = features(o.date, o.interval, prior) {
                rows.push(row);
                targets.push(o.price);
            }
            *idx += 1;
        }
        if rows.len() < MIN_TRAINING_ROWS {
            tracing::warn!(rows = rows.len(), "not enough complete rows to train");
            return Vec::new();
        }
        let Some(model) = RidgeModel::fit(&rows, &targets, self.lambda) else {
            tracing::warn!("ridge system could not be solved");
            return Vec::new();
        };
        tracing::debug!(rows = rows.len(), "trained ridge forecaster");

        let mut out = Vec::new();
        for d in 1..=days as u64 {
            let Some(date) = last_date.checked_add_days(Days::new(d)) else {
                break;
            };
            for interval in 1..=INTERVALS {
                let prior = series.entry(interval).or_default();
                let price = match features(date, interval, prior) {
                    Some(row) => model.predict(&row),
                    None => prior.last().copied().unwrap_or(model.intercept),
                };
                prior.push(price);
                out.push(ForecastPoint::new(date, interval, price));
            }
        }
        out
    }
}

/// Repeats the most recent observed day.
#[derive(Debug, Default, Clone, Copy)]
pub struct SeasonalNaive;

impl Forecaster for SeasonalNaive {
    fn forecast(&self, history: &[HistoryPoint], days: usize) -> Vec<ForecastPoint> {
        let Some(len) = horizon(days) else {
            return Vec::new();
        };
        if history.len() < MIN_HISTORY {
            return Vec::new();
        }
        let obs = observations(history);
        let Some(last_date) = obs.last().map(|o| o.date) else {
            return Vec::new();
        };
        let baseline: Vec<f64> = (1..=INTERVALS)
            .map(|i| {
                obs.iter()
                    .rev()
                    .find(|o| o.interval == i)
                    .map_or(0.0, |o| o.price)
            })
            .collect();
        let values = repeat_to_horizon(&baseline, len);

        values
            .iter()
            .enumerate()
            .filter_map(|(k, &price)| {
                let date = last_date.checked_add_days(Days::new(k as u64 / 24 + 1))?;
                Some(ForecastPoint::new(date, k as u32 % INTERVALS + 1, price))
            })
            .collect()
    }
}

/// Repeats or truncates `baseline` to exactly `horizon` values.
///
/// An empty baseline yields zeros.
///
/// # Examples
///
/// ```
/// use gme_grid::forecast::repeat_to_horizon;
///
/// assert_eq!(repeat_to_horizon(&[1.0, 2.0], 5), vec![1.0, 2.0, 1.0, 2.0, 1.0]);
/// ```
pub fn repeat_to_horizon(baseline: &[f64], horizon: usize) -> Vec<f64> {
    if baseline.is_empty() {
        return vec![0.0; horizon];
    }
    baseline.iter().copied().cycle().take(horizon).collect()
}

/// Writes forecast points as CSV with a `date,interval,price,type` header.
///
/// # Errors
///
/// Returns a `csv::Error` if writing fails.
pub fn write_forecast(points: &[ForecastPoint], writer: impl std::io::Write) -> Result<(), csv::Error> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    for p in points {
        wtr.serialize(p)?;
    }
    wtr.flush()?;
    Ok(())
}
