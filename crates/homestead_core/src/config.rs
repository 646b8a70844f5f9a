//! Layered core configuration.
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML
//! file, then `HOMESTEAD__<SECTION>__<KEY>` environment variables.

use crate::model::bill::BillType;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

const ENV_PREFIX: &str = "HOMESTEAD";
const ENV_SEPARATOR: &str = "__";
const DEFAULT_DB_FILE: &str = "homestead.sqlite3";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub database: DatabaseSettings,
    pub logging: LoggingSettings,
    pub pricing: UnitPriceTable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQLite database file; created on first open.
    pub path: PathBuf,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DB_FILE),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `trace|debug|info|warn|error`; build-mode default when unset.
    pub level: Option<String>,
    /// Absolute log directory. File logging stays off when unset.
    pub dir: Option<PathBuf>,
}

/// Per-type unit prices injected into the billing engine.
///
/// Metered types are priced per meter unit, flat-fee types per item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitPriceTable {
    pub electricity: i64,
    pub water: i64,
    pub garbage: i64,
    pub management: i64,
    pub parking: i64,
    /// `other` bills are rejected unless a price is configured.
    pub other: Option<i64>,
}

impl Default for UnitPriceTable {
    fn default() -> Self {
        Self {
            electricity: 3_000,
            water: 15_000,
            garbage: 25_000,
            management: 100_000,
            parking: 70_000,
            other: None,
        }
    }
}

impl UnitPriceTable {
    pub fn unit_price(&self, bill_type: BillType) -> Option<i64> {
        match bill_type {
            BillType::Electricity => Some(self.electricity),
            BillType::Water => Some(self.water),
            BillType::Garbage => Some(self.garbage),
            BillType::Management => Some(self.management),
            BillType::Parking => Some(self.parking),
            BillType::Other => self.other,
        }
    }

    /// Rejects zero or negative prices.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for bill_type in BillType::ALL {
            if let Some(price) = self.unit_price(bill_type) {
                if price <= 0 {
                    return Err(ConfigError::Invalid(format!(
                        "unit price for `{bill_type}` must be positive, got {price}"
                    )));
                }
            }
        }
        Ok(())
    }
}

impl CoreConfig {
    /// Loads defaults, then the optional TOML file, then environment overrides.
    ///
    /// # Errors
    /// - Returns [`ConfigError::Load`] when the file is missing or malformed.
    /// - Returns [`ConfigError::Invalid`] when prices fail validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?;

        let config: CoreConfig = settings.try_deserialize()?;
        config.pricing.validate()?;
        Ok(config)
    }

    /// Parses one TOML document without consulting the environment.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: CoreConfig = toml::from_str(source)?;
        config.pricing.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig, UnitPriceTable};
    use crate::model::bill::BillType;
    use std::io::Write;

    #[test]
    fn defaults_match_policy_prices() {
        let prices = UnitPriceTable::default();
        assert_eq!(prices.unit_price(BillType::Electricity), Some(3_000));
        assert_eq!(prices.unit_price(BillType::Water), Some(15_000));
        assert_eq!(prices.unit_price(BillType::Management), Some(100_000));
        assert_eq!(prices.unit_price(BillType::Other), None);
        assert!(prices.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_remaining_defaults() {
        let config = CoreConfig::from_toml_str(
            r#"
            [database]
            path = "/var/lib/homestead/ledger.sqlite3"

            [pricing]
            water = 18000
            other = 5000
            "#,
        )
        .unwrap();

        assert_eq!(
            config.database.path.to_str(),
            Some("/var/lib/homestead/ledger.sqlite3")
        );
        assert_eq!(config.pricing.water, 18_000);
        assert_eq!(config.pricing.electricity, 3_000);
        assert_eq!(config.pricing.unit_price(BillType::Other), Some(5_000));
        assert_eq!(config.logging.dir, None);
    }

    #[test]
    fn non_positive_price_is_rejected() {
        let err = CoreConfig::from_toml_str("[pricing]\nparking = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(message) if message.contains("parking")));
    }

    #[test]
    fn load_reads_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[pricing]\ngarbage = 30000\n[logging]\nlevel = \"warn\"").unwrap();

        let config = CoreConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.pricing.garbage, 30_000);
        assert_eq!(config.logging.level.as_deref(), Some("warn"));
    }

    #[test]
    fn load_fails_for_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(matches!(
            CoreConfig::load(Some(&missing)),
            Err(ConfigError::Load(_))
        ));
    }
}
