//! Static catalog of the markets exposed by the service.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Market family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketType {
    Electricity,
    Gas,
    Environmental,
}

impl MarketType {
    /// Data set requested for price queries in this family.
    pub fn data_name(self) -> &'static str {
        match self {
            Self::Electricity => "ME_ZonalPrices",
            Self::Gas => "GAS_ContinuousTrading",
            Self::Environmental => "ENV_Results",
        }
    }

    /// Markets of this family, as `(id, display name)`.
    pub fn markets(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Electricity => ELECTRICITY,
            Self::Gas => GAS,
            Self::Environmental => ENVIRONMENTAL,
        }
    }

    pub fn is_known_market(self, id: &str) -> bool {
        self.markets().iter().any(|(m, _)| *m == id)
    }
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Electricity => write!(f, "electricity"),
            Self::Gas => write!(f, "gas"),
            Self::Environmental => write!(f, "environmental"),
        }
    }
}

impl FromStr for MarketType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "electricity" => Ok(Self::Electricity),
            "gas" => Ok(Self::Gas),
            "environmental" => Ok(Self::Environmental),
            other => Err(format!(
                "unknown market type \"{other}\", expected electricity, gas, or environmental"
            )),
        }
    }
}

const ELECTRICITY: &[(&str, &str)] = &[
    ("MGP", "MGP - Day-Ahead Market"),
    ("MI1", "MI1 - Intraday Session 1"),
    ("MI2", "MI2 - Intraday Session 2"),
    ("MI3", "MI3 - Intraday Session 3"),
    ("MI4", "MI4 - Intraday Session 4"),
    ("MI5", "MI5 - Intraday Session 5"),
    ("MI6", "MI6 - Intraday Session 6"),
    ("MI7", "MI7 - Intraday Session 7"),
    ("MSD", "MSD - Ancillary Services Market"),
    ("MB", "MB - Balancing Market"),
];

const GAS: &[(&str, &str)] = &[
    ("MGP-GAS", "MGP-GAS - Day-Ahead Gas Market"),
    ("MI-GAS", "MI-GAS - Intraday Gas Market"),
    ("MI-GAS1", "MI-GAS1 - Gas Intraday Session 1"),
    ("MI-GAS2", "MI-GAS2 - Gas Intraday Session 2"),
    ("MI-GAS3", "MI-GAS3 - Gas Intraday Session 3"),
    ("MGS", "MGS - Gas Storage Market"),
];

const ENVIRONMENTAL: &[(&str, &str)] = &[
    ("TEE", "TEE - Energy Efficiency Certificates"),
    ("GO", "GO - Guarantees of Origin"),
    ("CV", "CV - Green Certificates"),
];

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketEntry {
    pub id: &'static str,
    pub name: &'static str,
}

/// The full catalog, grouped by family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketCatalog {
    pub electricity: Vec<MarketEntry>,
    pub gas: Vec<MarketEntry>,
    pub environmental: Vec<MarketEntry>,
}

impl MarketCatalog {
    pub fn new() -> Self {
        let entries = |t: MarketType| {
            t.markets()
                .iter()
                .map(|(id, name)| MarketEntry { id, name })
                .collect()
        };
        Self {
            electricity: entries(MarketType::Electricity),
            gas: entries(MarketType::Gas),
            environmental: entries(MarketType::Environmental),
        }
    }
}

impl Default for MarketCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_sizes() {
        let c = MarketCatalog::new();
        assert_eq!(c.electricity.len(), 10);
        assert_eq!(c.gas.len(), 6);
        assert_eq!(c.environmental.len(), 3);
    }

    #[test]
    fn parses_market_type() {
        assert_eq!("Gas".parse::<MarketType>(), Ok(MarketType::Gas));
        assert!("water".parse::<MarketType>().is_err());
        assert!(MarketType::Electricity.is_known_market("MSD"));
        assert!(!MarketType::Gas.is_known_market("MSD"));
    }
}
