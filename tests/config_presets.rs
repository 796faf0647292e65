//! Integration tests for configuration presets and TOML loading.

mod common;

use gme_grid::config::{AggregationConfig, ReductionStrategy};
use gme_grid::grid::pipeline;

#[test]
fn all_presets_are_valid() {
    for name in AggregationConfig::PRESETS {
        let config = AggregationConfig::from_preset(name).expect("known preset");
        let errors = config.validate();
        assert!(errors.is_empty(), "preset {name}: {errors:?}");
    }
}

#[test]
fn unknown_preset_lists_the_available_ones() {
    let err = AggregationConfig::from_preset("italy_99").expect_err("unknown preset");
    let msg = err.to_string();
    assert!(msg.contains("italy_30"));
    assert!(msg.contains("gme_zonal"));
}

#[test]
fn zonal_preset_targets_the_market_area() {
    let config = AggregationConfig::gme_zonal();
    assert_eq!(config.reduction.strategy, ReductionStrategy::Zones);
    assert!(config.input.regions.is_some());
    assert!(config.reduction.countries.iter().any(|c| c == "IT"));
    assert!(config.reduction.countries.iter().any(|c| c == "FR"));
}

#[test]
fn toml_file_drives_a_full_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    // Writes the input tables; only their paths are reused.
    let fixture = common::two_cluster_grid(dir.path());
    let toml = format!(
        r#"
[input]
substations = "{}"
lines = "{}"
generators = "{}"
demand = "{}"

[output]
dir = "{}"

[reduction]
n_clusters = 2
seed = 7
bus_prefix = "ZZ"

[costs]
overrides = {{ CCGT = 70.0 }}
"#,
        fixture.input.substations.display(),
        fixture.input.lines.display(),
        fixture.input.generators.display(),
        fixture.input.demand.display(),
        dir.path().join("toml_out").display(),
    );
    let path = common::write_file(dir.path(), "run.toml", &toml);

    let config = AggregationConfig::from_toml_file(&path).expect("valid toml");
    assert!(config.validate().is_empty());
    let net = pipeline::run(&config).expect("pipeline run");

    assert!(net.nodes.iter().all(|n| n.id.starts_with("ZZ_")));
    let ccgt = net
        .generators
        .iter()
        .find(|g| g.carrier == "CCGT")
        .expect("CCGT aggregated");
    assert!((ccgt.marginal_cost - 70.0).abs() < 1e-9);
    assert!(dir.path().join("toml_out").join("buses.csv").exists());
}

#[test]
fn unknown_toml_fields_are_rejected() {
    let err = AggregationConfig::from_toml_str("[reduction]\nclusters = 4\n");
    assert!(err.is_err());
}

#[test]
fn misspelled_strategy_is_rejected() {
    let err = AggregationConfig::from_toml_str("[reduction]\nstrategy = \"zone\"\n")
        .expect_err("unknown strategy");
    assert_eq!(err.field, "toml");
    assert!(err.message.contains("zone"));
}
