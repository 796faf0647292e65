//! Balancing-market analysis: MSD volumes and their premium over MGP.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::Write;
use std::path::Path;

use serde::Deserialize;

use super::{AnalysisError, market_file, mean, read_required, write_file};
use crate::io::input::read_table;
use crate::market::records::{BalancingResult, ZonalPrice};

/// Purchased and sold volumes of one zone over the day.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneVolumes {
    pub zone: String,
    /// Upward regulation (MWh).
    pub purchased: f64,
    /// Downward regulation (MWh).
    pub sold: f64,
}

impl ZoneVolumes {
    pub fn net(&self) -> f64 {
        self.purchased - self.sold
    }

    pub fn total(&self) -> f64 {
        self.purchased + self.sold
    }
}

/// Purchased and sold volumes of one hour, summed over zones.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyVolumes {
    pub hour: u32,
    pub purchased: f64,
    pub sold: f64,
}

impl HourlyVolumes {
    pub fn net(&self) -> f64 {
        self.purchased - self.sold
    }
}

/// Average MSD purchasing price minus the MGP zonal price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PremiumStats {
    pub mean: f64,
    pub max: f64,
    /// Matched records.
    pub samples: usize,
}

/// One MB result row; only the grouping columns are read.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MbRecord {
    #[serde(default)]
    pub zone: Option<String>,
    #[serde(default, rename(deserialize = "servicetype"))]
    pub service_type: Option<String>,
}

/// Row counts of the MB table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MbSummary {
    pub records: usize,
    /// Rows per zone, most frequent first.
    pub zones: Vec<(String, usize)>,
    /// Rows per service type, most frequent first.
    pub service_types: Vec<(String, usize)>,
}

impl MbSummary {
    pub fn from_records(records: &[MbRecord]) -> Self {
        Self {
            records: records.len(),
            zones: counts(records.iter().filter_map(|r| r.zone.as_deref())),
            service_types: counts(records.iter().filter_map(|r| r.service_type.as_deref())),
        }
    }
}

fn counts<'a>(labels: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut map: BTreeMap<&str, usize> = BTreeMap::new();
    for l in labels.map(str::trim).filter(|l| !l.is_empty()) {
        *map.entry(l).or_default() += 1;
    }
    let mut out: Vec<(String, usize)> = map.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    out.sort_by(|a, b| b.1.cmp(&a.1));
    out
}

/// Balancing report for one day.
#[derive(Debug, Clone, PartialEq)]
pub struct BalancingReport {
    pub total_records: usize,
    /// Records with any purchased or sold volume.
    pub active_records: usize,
    /// Highest total volume first.
    pub zones: Vec<ZoneVolumes>,
    /// Ascending by hour.
    pub hourly: Vec<HourlyVolumes>,
    /// Hour with the most upward regulation.
    pub peak_upward_hour: Option<u32>,
    pub premium: Option<PremiumStats>,
    pub mb: Option<MbSummary>,
}

impl BalancingReport {
    /// Builds the report from MSD results and the MGP prices of the same day.
    ///
    /// The premium is computed over active records that have both an
    /// average purchasing price and an MGP price for the same
    /// (hour, period, zone).
    pub fn build(msd: &[BalancingResult], mgp: &[ZonalPrice], mb: Option<MbSummary>) -> Self {
        let active: Vec<&BalancingResult> = msd
            .iter()
            .filter(|r| r.volumes_purchased > 0.0 || r.volumes_sold > 0.0)
            .collect();

        let mut zone_map: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
        let mut hour_map: BTreeMap<u32, (f64, f64)> = BTreeMap::new();
        for r in msd {
            let z = zone_map.entry(r.zone.trim()).or_default();
            z.0 += r.volumes_purchased;
            z.1 += r.volumes_sold;
            let h = hour_map.entry(r.hour).or_default();
            h.0 += r.volumes_purchased;
            h.1 += r.volumes_sold;
        }

        let mut zones: Vec<ZoneVolumes> = zone_map
            .into_iter()
            .map(|(zone, (purchased, sold))| ZoneVolumes {
                zone: zone.to_string(),
                purchased,
                sold,
            })
            .collect();
        zones.sort_by(|a, b| b.total().total_cmp(&a.total()));

        let hourly: Vec<HourlyVolumes> = hour_map
            .into_iter()
            .map(|(hour, (purchased, sold))| HourlyVolumes {
                hour,
                purchased,
                sold,
            })
            .collect();
        // First maximum wins.
        let peak_upward_hour = hourly
            .iter()
            .fold(None::<&HourlyVolumes>, |best, h| match best {
                Some(b) if b.purchased >= h.purchased => Some(b),
                _ => Some(h),
            })
            .map(|h| h.hour);

        Self {
            total_records: msd.len(),
            active_records: active.len(),
            zones,
            hourly,
            peak_upward_hour,
            premium: premium(&active, mgp),
            mb,
        }
    }

    /// Writes the zone and hourly tables into `dir`.
    ///
    /// # Errors
    ///
    /// Returns an [`AnalysisError`] naming the first file that failed.
    pub fn write(&self, dir: &Path) -> Result<(), AnalysisError> {
        write_file(&dir.join("msd_zone_volumes.csv"), |w| {
            write_zone_volumes(&self.zones, w)
        })?;
        write_file(&dir.join("msd_hourly_volumes.csv"), |w| {
            write_hourly_volumes(&self.hourly, w)
        })?;
        Ok(())
    }
}

fn premium(active: &[&BalancingResult], mgp: &[ZonalPrice]) -> Option<PremiumStats> {
    let mut prices: HashMap<(u32, u32, &str), f64> = HashMap::with_capacity(mgp.len());
    for p in mgp.iter().filter(|p| p.price.is_finite()) {
        prices.entry((p.hour, p.period, p.zone.trim())).or_insert(p.price);
    }
    let diffs: Vec<f64> = active
        .iter()
        .filter_map(|r| {
            let msd_price = r.average_purchasing_price.filter(|v| v.is_finite())?;
            let mgp_price = prices.get(&(r.hour, r.period, r.zone.trim()))?;
            Some(msd_price - mgp_price)
        })
        .collect();
    let samples = diffs.len();
    let max = diffs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    mean(diffs).map(|mean| PremiumStats { mean, max, samples })
}

/// Writes per-zone volumes.
///
/// # Errors
///
/// Returns a `csv::Error` if writing fails.
pub fn write_zone_volumes(rows: &[ZoneVolumes], writer: impl Write) -> Result<(), csv::Error> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(["zone", "purchased_mwh", "sold_mwh", "net_purchased_mwh", "total_mwh"])?;
    for r in rows {
        wtr.write_record(&[
            r.zone.clone(),
            format!("{:.3}", r.purchased),
            format!("{:.3}", r.sold),
            format!("{:.3}", r.net()),
            format!("{:.3}", r.total()),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_hourly_volumes(rows: &[HourlyVolumes], writer: impl Write) -> Result<(), csv::Error> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(["hour", "purchased_mwh", "sold_mwh", "net_mwh"])?;
    for r in rows {
        wtr.write_record(&[
            r.hour.to_string(),
            format!("{:.3}", r.purchased),
            format!("{:.3}", r.sold),
            format!("{:.3}", r.net()),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

impl fmt::Display for BalancingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Balancing Report ---")?;
        let share = if self.total_records > 0 {
            self.active_records as f64 / self.total_records as f64 * 100.0
        } else {
            0.0
        };
        writeln!(
            f,
            "MSD records:           {} ({} active, {share:.1}%)",
            self.total_records, self.active_records
        )?;
        writeln!(f, "Zones by total volume:")?;
        for z in self.zones.iter().take(10) {
            writeln!(
                f,
                "  {:<8} up {:>10.0}  down {:>10.0}  net {:>10.0} MWh",
                z.zone,
                z.purchased,
                z.sold,
                z.net()
            )?;
        }
        if let Some(hour) = self.peak_upward_hour {
            let volume = self
                .hourly
                .iter()
                .find(|h| h.hour == hour)
                .map_or(0.0, |h| h.purchased);
            writeln!(f, "Peak upward hour:      {hour} ({volume:.0} MWh)")?;
        }
        match &self.premium {
            Some(p) => write!(
                f,
                "MSD premium over MGP:  mean {:.2}, max {:.2} EUR/MWh ({} records)",
                p.mean, p.max, p.samples
            )?,
            None => write!(f, "MSD premium over MGP:  n/a")?,
        }
        if let Some(mb) = &self.mb {
            write!(f, "\nMB records:            {}", mb.records)?;
            for (zone, n) in &mb.zones {
                write!(f, "\n  {zone:<8} {n}")?;
            }
        }
        Ok(())
    }
}

/// Runs the balancing analysis for one downloaded day.
///
/// Reads `MSD_ME_MSDExAnteResults_{date}.csv` and
/// `MGP_ME_ZonalPrices_{date}.csv` from `data_dir`, plus
/// `MB_ME_MBResults_{date}.csv` when present.
///
/// # Errors
///
/// Returns an [`AnalysisError`] if the MSD or MGP table is missing or
/// empty.
pub fn analyze_day(data_dir: &Path, date: &str) -> Result<BalancingReport, AnalysisError> {
    let msd: Vec<BalancingResult> =
        read_required(&market_file(data_dir, "MSD", "ME_MSDExAnteResults", date))?;
    let mgp: Vec<ZonalPrice> =
        read_required(&market_file(data_dir, "MGP", "ME_ZonalPrices", date))?;

    let mb_path = market_file(data_dir, "MB", "ME_MBResults", date);
    let mb = if mb_path.exists() {
        let records: Vec<MbRecord> = read_table(&mb_path)?;
        Some(MbSummary::from_records(&records))
    } else {
        tracing::warn!(path = %mb_path.display(), "MB results not found");
        None
    };
    Ok(BalancingReport::build(&msd, &mgp, mb))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msd(zone: &str, hour: u32, purchased: f64, sold: f64, price: Option<f64>) -> BalancingResult {
        BalancingResult {
            zone: zone.into(),
            hour,
            period: 1,
            volumes_purchased: purchased,
            volumes_sold: sold,
            average_purchasing_price: price,
        }
    }

    fn mgp(zone: &str, hour: u32, price: f64) -> ZonalPrice {
        ZonalPrice {
            flow_date: None,
            hour,
            period: 1,
            zone: zone.into(),
            price,
        }
    }

    #[test]
    fn zones_sorted_by_total_volume() {
        let rows = vec![
            msd("NORD", 1, 10.0, 5.0, None),
            msd("SUD", 1, 100.0, 0.0, None),
            msd("NORD", 2, 0.0, 20.0, None),
            msd("SICI", 2, 0.0, 0.0, None),
        ];
        let report = BalancingReport::build(&rows, &[], None);
        assert_eq!(report.total_records, 4);
        assert_eq!(report.active_records, 3);
        assert_eq!(report.zones[0].zone, "SUD");
        assert_eq!(report.zones[1].zone, "NORD");
        assert_eq!(report.zones[1].net(), -15.0);
        assert_eq!(report.zones[1].total(), 35.0);
        assert_eq!(report.peak_upward_hour, Some(1));
        assert!(report.premium.is_none());
    }

    #[test]
    fn premium_matches_on_hour_period_zone() {
        let rows = vec![
            msd("NORD", 1, 10.0, 0.0, Some(150.0)),
            msd("SUD", 1, 10.0, 0.0, Some(120.0)),
            msd("CALA", 1, 10.0, 0.0, Some(500.0)),
            msd("NORD", 2, 0.0, 0.0, Some(900.0)),
        ];
        let prices = vec![mgp("NORD", 1, 100.0), mgp("SUD", 1, 110.0), mgp("NORD", 2, 100.0)];
        let report = BalancingReport::build(&rows, &prices, None);
        let p = report.premium.expect("premium");
        assert_eq!(p.samples, 2);
        assert_eq!(p.mean, 30.0);
        assert_eq!(p.max, 50.0);
    }

    #[test]
    fn mb_counts_most_frequent_first() {
        let records = vec![
            MbRecord {
                zone: Some("NORD".into()),
                service_type: Some("GR1".into()),
            },
            MbRecord {
                zone: Some("SUD".into()),
                service_type: None,
            },
            MbRecord {
                zone: Some("SUD".into()),
                service_type: None,
            },
        ];
        let mb = MbSummary::from_records(&records);
        assert_eq!(mb.records, 3);
        assert_eq!(mb.zones[0], ("SUD".to_string(), 2));
        assert_eq!(mb.service_types.len(), 1);
    }
}
