//! Integration tests for the per-day market analyses.

mod common;

use std::fs;

use gme_grid::analysis::AnalysisError;
use gme_grid::analysis::balancing;
use gme_grid::analysis::congestion::{self, ReportLimits};
use gme_grid::analysis::prices;

const DATE: &str = "2025-12-30";

#[test]
fn congestion_prefers_published_limits() {
    let dir = tempfile::tempdir().expect("tempdir");
    let data = dir.path().join("data");
    let network = dir.path().join("network");
    fs::create_dir_all(&data).expect("data dir");
    common::market_day(&data, DATE);
    common::zonal_network(&network);

    let report = congestion::analyze_day(&data, &network, DATE, ReportLimits::default())
        .expect("congestion analysis");

    assert_eq!(report.total_records, 5);
    assert_eq!(report.network_records, 3);
    assert_eq!(report.corridors.len(), 1);
    let top = &report.corridors[0];
    assert_eq!(top.corridor, "NORD-CNOR");
    assert!((top.mean_utilization - 50.0).abs() < 1e-9);
    assert_eq!(top.samples, 2);

    // Backbone activity covers every record, not only network corridors.
    let h8 = report
        .north_south
        .iter()
        .find(|h| h.hour == 8)
        .expect("hour 8");
    assert!((h8.mean_abs_flow - 2800.0 / 3.0).abs() < 1e-9);
    assert!((h8.mean_utilization.expect("utilization") - 125.0 / 3.0).abs() < 1e-9);

    let spread = |hour: u32| {
        report
            .price_spread
            .iter()
            .find(|s| s.hour == hour)
            .map(|s| s.spread)
    };
    assert_eq!(spread(8), Some(-10.0));
    assert_eq!(spread(12), Some(0.0));
    assert_eq!(spread(13), Some(15.0));
}

#[test]
fn congestion_falls_back_to_network_capacity() {
    let dir = tempfile::tempdir().expect("tempdir");
    let data = dir.path().join("data");
    let network = dir.path().join("network");
    fs::create_dir_all(&data).expect("data dir");
    common::market_day(&data, DATE);
    common::zonal_network(&network);
    fs::remove_file(data.join(format!("MGP_ME_TransmissionLimits_{DATE}.csv")))
        .expect("remove limits");

    let report = congestion::analyze_day(&data, &network, DATE, ReportLimits::default())
        .expect("congestion analysis");

    // 1500, 1000, and 500 MW over a 4000 MW line.
    let top = &report.corridors[0];
    assert!((top.mean_utilization - 25.0).abs() < 1e-9);
    assert_eq!(top.samples, 3);
}

#[test]
fn congestion_tables_are_written() {
    let dir = tempfile::tempdir().expect("tempdir");
    let data = dir.path().join("data");
    let network = dir.path().join("network");
    let out = dir.path().join("analysis");
    fs::create_dir_all(&data).expect("data dir");
    common::market_day(&data, DATE);
    common::zonal_network(&network);

    let report = congestion::analyze_day(&data, &network, DATE, ReportLimits::default())
        .expect("congestion analysis");
    report.write(&out).expect("write report");

    for name in [
        "corridor_utilization.csv",
        "morning_top.csv",
        "midday_top.csv",
        "north_south_hourly.csv",
        "price_spread.csv",
        "session_matrix.csv",
    ] {
        assert!(out.join(name).exists(), "{name} missing");
    }

    let (header, rows) = common::read_csv(&out.join("session_matrix.csv"));
    assert_eq!(header, ["corridor", "29", "30"]);
    assert_eq!(rows, vec![vec!["NORD-CNOR", "50.00", "50.00"]]);
}

#[test]
fn congestion_without_transits_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let result = congestion::analyze_day(dir.path(), dir.path(), DATE, ReportLimits::default());
    assert!(matches!(result, Err(AnalysisError::Input(_))));
}

#[test]
fn balancing_summarizes_msd_volumes_and_premium() {
    let dir = tempfile::tempdir().expect("tempdir");
    common::market_day(dir.path(), DATE);

    let report = balancing::analyze_day(dir.path(), DATE).expect("balancing analysis");
    assert_eq!(report.total_records, 3);
    assert_eq!(report.active_records, 2);
    assert_eq!(report.peak_upward_hour, Some(8));
    assert!(report.mb.is_none());

    let sud = report
        .zones
        .iter()
        .find(|z| z.zone == "SUD")
        .expect("SUD volumes");
    assert!((sud.total() - 60.0).abs() < 1e-9);
    assert!((sud.net() + 20.0).abs() < 1e-9);

    // Only NORD hour 8 has both an MSD and an MGP price.
    let premium = report.premium.expect("premium");
    assert_eq!(premium.samples, 1);
    assert!((premium.mean - 50.0).abs() < 1e-9);
}

#[test]
fn balancing_reads_mb_results_when_present() {
    let dir = tempfile::tempdir().expect("tempdir");
    common::market_day(dir.path(), DATE);
    common::write_file(
        dir.path(),
        &format!("MB_ME_MBResults_{DATE}.csv"),
        "Zone,ServiceType,Hour\nNORD,AS,1\nNORD,RS,2\nSUD,AS,3\n",
    );

    let report = balancing::analyze_day(dir.path(), DATE).expect("balancing analysis");
    let mb = report.mb.expect("MB summary");
    assert_eq!(mb.records, 3);
    assert_eq!(mb.zones[0], ("NORD".to_string(), 2));
    assert_eq!(mb.service_types[0], ("AS".to_string(), 2));
}

#[test]
fn balancing_with_empty_msd_table_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    common::market_day(dir.path(), DATE);
    common::write_file(
        dir.path(),
        &format!("MSD_ME_MSDExAnteResults_{DATE}.csv"),
        "FlowDate,Hour,Period,Zone,VolumesPurchased,VolumesSold\n",
    );
    let result = balancing::analyze_day(dir.path(), DATE);
    assert!(matches!(result, Err(AnalysisError::Empty(_))));
}

#[test]
fn bus_prices_use_pun_for_unpriced_domestic_zones() {
    let dir = tempfile::tempdir().expect("tempdir");
    let network = dir.path().join("network");
    common::market_day(dir.path(), DATE);
    common::zonal_network(&network);

    let rows = prices::analyze_hour(dir.path(), &network, DATE, 12).expect("bus prices");
    let price = |id: &str| rows.iter().find(|r| r.bus_id == id).expect("bus");

    assert_eq!(price("NORD").price, Some(115.0));
    assert!(!price("NORD").from_pun);
    assert_eq!(price("CNOR").price, Some(112.0));
    assert!(price("CNOR").from_pun);
    assert_eq!(price("FRAN").price, None);
}
