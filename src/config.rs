//! TOML-based aggregation configuration and preset definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::grid::tables::{FALLBACK_MARGINAL_COST, LookupTables};

/// Top-level aggregation configuration parsed from TOML.
///
/// All fields have defaults matching the 30-node clustering run. Load from
/// TOML with [`AggregationConfig::from_toml_file`] or use
/// [`AggregationConfig::italy_30`] for the built-in default.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AggregationConfig {
    /// Input table locations.
    #[serde(default)]
    pub input: InputConfig,
    /// Result location.
    #[serde(default)]
    pub output: OutputConfig,
    /// Spatial reduction parameters.
    #[serde(default)]
    pub reduction: ReductionConfig,
    /// Line capacity sources.
    #[serde(default)]
    pub capacity: CapacityConfig,
    /// Marginal-cost table adjustments.
    #[serde(default)]
    pub costs: CostConfig,
}

/// Input table locations.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputConfig {
    pub substations: PathBuf,
    pub lines: PathBuf,
    pub generators: PathBuf,
    /// Hourly system demand.
    pub demand: PathBuf,
    /// GeoJSON region polygons; required by the `zones` strategy.
    pub regions: Option<PathBuf>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            substations: PathBuf::from("data_italy/substations.csv"),
            lines: PathBuf::from("data_italy/lines_transmission.csv"),
            generators: PathBuf::from("data_italy/generators_with_capacity.csv"),
            demand: PathBuf::from("data_italy/demand_hourly.csv"),
            regions: None,
        }
    }
}

/// Result location.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Directory for the result tables; created if missing.
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data_italy/aggregated_30"),
        }
    }
}

/// How substations are grouped into nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReductionStrategy {
    /// Seeded k-means over substation coordinates.
    #[default]
    Kmeans,
    /// Bidding zones via region polygons.
    Zones,
}

impl fmt::Display for ReductionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kmeans => write!(f, "kmeans"),
            Self::Zones => write!(f, "zones"),
        }
    }
}

/// Spatial reduction parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReductionConfig {
    pub strategy: ReductionStrategy,
    /// Number of clusters for `kmeans` (must be > 0).
    pub n_clusters: usize,
    /// k-means random seed.
    pub seed: u64,
    /// k-means restarts (must be > 0).
    pub n_init: usize,
    /// Lloyd iterations per restart (must be > 0).
    pub max_iter: usize,
    /// Substations below this voltage are ignored (kV).
    pub min_voltage_kv: f64,
    /// Node id prefix for `kmeans` runs.
    pub bus_prefix: String,
    /// Outside points within this distance of a region snap to it (degrees).
    pub coastal_threshold_deg: f64,
    /// Zones emitted by `zones` runs even without members.
    pub include_zones: Vec<String>,
    /// Country codes kept; empty keeps all. Substations with no country
    /// code are always kept.
    pub countries: Vec<String>,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            strategy: ReductionStrategy::Kmeans,
            n_clusters: 30,
            seed: 42,
            n_init: 10,
            max_iter: 300,
            min_voltage_kv: 132.0,
            bus_prefix: "IT".to_string(),
            coastal_threshold_deg: 0.1,
            include_zones: Vec::new(),
            countries: Vec::new(),
        }
    }
}

/// Line capacity sources.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CapacityConfig {
    /// Transmission-limits CSV whose corridor limits replace the heuristic.
    pub limits: Option<PathBuf>,
}

/// Marginal-cost table adjustments.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CostConfig {
    /// Cost for carriers missing from the table (EUR/MWh).
    pub fallback: f64,
    /// Per-carrier costs replacing or extending the built-in table.
    pub overrides: BTreeMap<String, f64>,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            fallback: FALLBACK_MARGINAL_COST,
            overrides: BTreeMap::new(),
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"reduction.n_clusters"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

impl AggregationConfig {
    /// 30-node k-means reduction of the detailed Italian grid.
    pub fn italy_30() -> Self {
        Self {
            input: InputConfig::default(),
            output: OutputConfig::default(),
            reduction: ReductionConfig::default(),
            capacity: CapacityConfig::default(),
            costs: CostConfig::default(),
        }
    }

    /// Bidding-zone reduction of Italy and its neighbours.
    pub fn gme_zonal() -> Self {
        Self {
            input: InputConfig {
                substations: PathBuf::from("data_pypsa_eur/buses.csv"),
                lines: PathBuf::from("data_pypsa_eur/lines.csv"),
                generators: PathBuf::from("data_pypsa_eur/generators.csv"),
                demand: PathBuf::from("data_pypsa_eur/demand_hourly.csv"),
                regions: Some(PathBuf::from("aggregation/italy_regions.geojson")),
            },
            output: OutputConfig {
                dir: PathBuf::from("data_pypsa_eur_zonal"),
            },
            reduction: ReductionConfig {
                strategy: ReductionStrategy::Zones,
                countries: ["IT", "AT", "FR", "CH", "SI", "GR", "ME"]
                    .map(String::from)
                    .to_vec(),
                ..ReductionConfig::default()
            },
            capacity: CapacityConfig::default(),
            costs: CostConfig::default(),
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["italy_30", "gme_zonal"];

    /// Loads a configuration from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "italy_30" => Ok(Self::italy_30()),
            "gme_zonal" => Ok(Self::gme_zonal()),
            _ => Err(ConfigError {
                field: "preset".to_string(),
                message: format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            }),
        }
    }

    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError {
            field: "config".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Lookup tables with this configuration's cost adjustments applied.
    pub fn lookup_tables(&self) -> LookupTables {
        let mut tables = LookupTables {
            fallback_cost: self.costs.fallback,
            ..LookupTables::default()
        };
        for (carrier, cost) in &self.costs.overrides {
            tables.fuel_costs.insert(carrier.clone(), *cost);
        }
        tables
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let r = &self.reduction;

        match r.strategy {
            ReductionStrategy::Kmeans => {
                if r.n_clusters == 0 {
                    errors.push(ConfigError {
                        field: "reduction.n_clusters".into(),
                        message: "must be > 0".into(),
                    });
                }
                if r.bus_prefix.trim().is_empty() {
                    errors.push(ConfigError {
                        field: "reduction.bus_prefix".into(),
                        message: "must not be empty".into(),
                    });
                }
            }
            ReductionStrategy::Zones => {
                if self.input.regions.is_none() {
                    errors.push(ConfigError {
                        field: "input.regions".into(),
                        message: "required when reduction.strategy is \"zones\"".into(),
                    });
                }
            }
        }
        if r.n_init == 0 {
            errors.push(ConfigError {
                field: "reduction.n_init".into(),
                message: "must be > 0".into(),
            });
        }
        if r.max_iter == 0 {
            errors.push(ConfigError {
                field: "reduction.max_iter".into(),
                message: "must be > 0".into(),
            });
        }
        if !r.min_voltage_kv.is_finite() || r.min_voltage_kv < 0.0 {
            errors.push(ConfigError {
                field: "reduction.min_voltage_kv".into(),
                message: "must be a non-negative number".into(),
            });
        }
        if !r.coastal_threshold_deg.is_finite() || r.coastal_threshold_deg < 0.0 {
            errors.push(ConfigError {
                field: "reduction.coastal_threshold_deg".into(),
                message: "must be a non-negative number".into(),
            });
        }

        if !self.costs.fallback.is_finite() || self.costs.fallback < 0.0 {
            errors.push(ConfigError {
                field: "costs.fallback".into(),
                message: "must be a non-negative number".into(),
            });
        }
        for (carrier, cost) in &self.costs.overrides {
            if !cost.is_finite() || *cost < 0.0 {
                errors.push(ConfigError {
                    field: format!("costs.overrides.{carrier}"),
                    message: "must be a non-negative number".into(),
                });
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn italy_30_preset_valid() {
        let cfg = AggregationConfig::italy_30();
        let errors = cfg.validate();
        assert!(errors.is_empty(), "italy_30 should be valid: {errors:?}");
    }

    #[test]
    fn gme_zonal_preset_valid() {
        let cfg = AggregationConfig::from_preset("gme_zonal").expect("known preset");
        assert!(cfg.validate().is_empty());
        assert_eq!(cfg.reduction.strategy, ReductionStrategy::Zones);
    }

    #[test]
    fn from_preset_unknown() {
        let err = AggregationConfig::from_preset("nonexistent");
        assert!(err.is_err());
        let msg = err.err().map(|e| e.message).unwrap_or_default();
        assert!(msg.contains("italy_30"));
    }

    #[test]
    fn valid_toml_parses() {
        let toml_str = r#"
[input]
substations = "subs.csv"
lines = "lines.csv"
generators = "gens.csv"
demand = "demand.csv"

[output]
dir = "out"

[reduction]
n_clusters = 12
seed = 7
min_voltage_kv = 220.0

[costs]
fallback = 80.0
overrides = { CCGT = 70.0, nuclear = 12.0 }
"#;
        let cfg = AggregationConfig::from_toml_str(toml_str).expect("valid toml");
        assert_eq!(cfg.reduction.n_clusters, 12);
        assert_eq!(cfg.reduction.n_init, 10);
        assert!(cfg.validate().is_empty());

        let tables = cfg.lookup_tables();
        assert_eq!(tables.marginal_cost("CCGT"), 70.0);
        assert_eq!(tables.marginal_cost("nuclear"), 12.0);
        assert_eq!(tables.marginal_cost("hydro"), 5.0);
        assert_eq!(tables.marginal_cost("unobtainium"), 80.0);
    }

    #[test]
    fn invalid_toml_unknown_field() {
        let toml_str = r#"
[reduction]
n_clusters = 30
clusters = 5
"#;
        let result = AggregationConfig::from_toml_str(toml_str);
        assert!(result.is_err());
    }

    #[test]
    fn validation_catches_zero_clusters() {
        let mut cfg = AggregationConfig::italy_30();
        cfg.reduction.n_clusters = 0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "reduction.n_clusters"));
    }

    #[test]
    fn unknown_strategy_is_rejected_at_parse() {
        let err = AggregationConfig::from_toml_str("[reduction]\nstrategy = \"kmean\"\n");
        assert!(err.is_err());
        let cfg = AggregationConfig::from_toml_str("[reduction]\nstrategy = \"zones\"\n")
            .expect("zones parses");
        assert_eq!(cfg.reduction.strategy, ReductionStrategy::Zones);
    }

    #[test]
    fn zones_strategy_requires_regions() {
        let mut cfg = AggregationConfig::gme_zonal();
        cfg.input.regions = None;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "input.regions"));
    }

    #[test]
    fn validation_catches_negative_cost_override() {
        let mut cfg = AggregationConfig::italy_30();
        cfg.costs.overrides.insert("coal".into(), -1.0);
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "costs.overrides.coal"));
    }
}
