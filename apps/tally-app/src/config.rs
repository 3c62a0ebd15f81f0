//! # Application Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TALLY_DB_PATH=/srv/shop/tally.db                                   │
//! │     TALLY_STOCK_POLICY=reject_negative                                 │
//! │     TALLY_REPORT_UTC_OFFSET_MINUTES=300                                │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     $TALLY_CONFIG, or ~/.config/tally/tally.toml (Linux)               │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     database in the platform data dir, allow_negative, UTC             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "tally.db"
//! max_connections = 5
//! busy_timeout_ms = 5000
//!
//! [ledger]
//! stock_policy = "allow_negative"
//! walk_in_customer = "Walk-in Customer"
//!
//! [report]
//! utc_offset_minutes = 0
//! ```

use std::path::PathBuf;
use std::time::Duration;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use tally_core::{StockPolicy, WALK_IN_CUSTOMER};
use tally_db::DbConfig;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Widest real-world UTC offset, in minutes.
const MAX_OFFSET_MINUTES: i32 = 14 * 60;

/// Errors loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Could not determine app data directory")]
    NoDataDir,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Database file. Defaults to `tally.db` in the platform data dir.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout() -> u64 {
    5000
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: None,
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

// =============================================================================
// Ledger Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSettings {
    /// Whether saving a bill may take stock below zero.
    #[serde(default)]
    pub stock_policy: StockPolicy,

    /// Customer name recorded when a bill has none.
    #[serde(default = "default_walk_in")]
    pub walk_in_customer: String,
}

fn default_walk_in() -> String {
    WALK_IN_CUSTOMER.to_string()
}

impl Default for LedgerSettings {
    fn default() -> Self {
        LedgerSettings {
            stock_policy: StockPolicy::default(),
            walk_in_customer: default_walk_in(),
        }
    }
}

// =============================================================================
// Report Settings
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSettings {
    /// Shop wall clock relative to UTC; report windows are cut on it.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

// =============================================================================
// App Configuration
// =============================================================================

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub ledger: LedgerSettings,

    #[serde(default)]
    pub report: ReportSettings,
}

impl AppConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`config_path`, else `TALLY_CONFIG`, else the
    ///    platform config dir)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let path = config_path
            .or_else(|| std::env::var("TALLY_CONFIG").ok().map(PathBuf::from))
            .or_else(Self::default_config_path);

        let mut config = match path {
            Some(path) if path.exists() => {
                info!(?path, "Loading config from file");
                Self::from_toml(&std::fs::read_to_string(&path)?)?
            }
            Some(path) => {
                debug!(?path, "Config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML document; missing sections take their defaults.
    pub fn from_toml(contents: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "max_connections must be greater than 0".into(),
            ));
        }

        if self.report.utc_offset_minutes.abs() > MAX_OFFSET_MINUTES {
            return Err(ConfigError::Invalid(format!(
                "utc_offset_minutes must be within ±{}, got {}",
                MAX_OFFSET_MINUTES, self.report.utc_offset_minutes
            )));
        }

        if self.ledger.walk_in_customer.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "walk_in_customer must not be empty".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies `TALLY_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("TALLY_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        if let Some(policy) = lookup("TALLY_STOCK_POLICY") {
            match policy.parse() {
                Ok(parsed) => {
                    debug!(policy = %policy, "Overriding stock policy from environment");
                    self.ledger.stock_policy = parsed;
                }
                Err(_) => warn!(policy = %policy, "Unknown stock policy in environment"),
            }
        }

        if let Some(offset) = lookup("TALLY_REPORT_UTC_OFFSET_MINUTES") {
            match offset.parse::<i32>() {
                Ok(minutes) => self.report.utc_offset_minutes = minutes,
                Err(_) => warn!(offset = %offset, "Invalid report offset in environment"),
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "tally", "tally")
            .map(|dirs| dirs.config_dir().join("tally.toml"))
    }

    // =========================================================================
    // Derived Settings
    // =========================================================================

    /// Database file path, creating the platform data dir when defaulted.
    pub fn database_path(&self) -> ConfigResult<PathBuf> {
        if let Some(path) = &self.database.path {
            return Ok(path.clone());
        }

        let dirs =
            directories::ProjectDirs::from("com", "tally", "tally").ok_or(ConfigError::NoDataDir)?;
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;
        Ok(data_dir.join("tally.db"))
    }

    /// Pool configuration for [`tally_db::Database::new`].
    pub fn db_config(&self) -> ConfigResult<DbConfig> {
        Ok(DbConfig::new(self.database_path()?)
            .max_connections(self.database.max_connections)
            .busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
            .stock_policy(self.ledger.stock_policy)
            .walk_in_customer(self.ledger.walk_in_customer.clone()))
    }

    /// The report wall-clock offset.
    pub fn report_offset(&self) -> ConfigResult<FixedOffset> {
        FixedOffset::east_opt(self.report.utc_offset_minutes * 60).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "utc_offset_minutes out of range: {}",
                self.report.utc_offset_minutes
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.ledger.stock_policy, StockPolicy::AllowNegative);
        assert_eq!(config.ledger.walk_in_customer, "Walk-in Customer");
        assert_eq!(config.report_offset().unwrap().local_minus_utc(), 0);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = AppConfig::from_toml(
            r#"
            [ledger]
            stock_policy = "reject_negative"

            [report]
            utc_offset_minutes = 300
            "#,
        )
        .unwrap();

        assert_eq!(config.ledger.stock_policy, StockPolicy::RejectNegative);
        assert_eq!(config.ledger.walk_in_customer, "Walk-in Customer");
        assert_eq!(config.database, DatabaseSettings::default());
        assert_eq!(config.report_offset().unwrap().local_minus_utc(), 300 * 60);
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        let err = AppConfig::from_toml("[ledger]\nstock_policy = \"maybe\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("TALLY_DB_PATH", "/tmp/shop.db"),
            ("TALLY_STOCK_POLICY", "strict"),
            ("TALLY_REPORT_UTC_OFFSET_MINUTES", "-240"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.path, Some(PathBuf::from("/tmp/shop.db")));
        assert_eq!(config.ledger.stock_policy, StockPolicy::RejectNegative);
        assert_eq!(config.report.utc_offset_minutes, -240);
        assert_eq!(config.database_path().unwrap(), PathBuf::from("/tmp/shop.db"));
    }

    #[test]
    fn test_invalid_overrides_are_ignored() {
        let mut config = AppConfig::default();
        config.apply_overrides(|key| match key {
            "TALLY_STOCK_POLICY" => Some("sometimes".to_string()),
            "TALLY_REPORT_UTC_OFFSET_MINUTES" => Some("noon".to_string()),
            _ => None,
        });
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_validation() {
        let mut config = AppConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.report.utc_offset_minutes = 15 * 60;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.ledger.walk_in_customer = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_db_config_carries_ledger_settings() {
        let mut config = AppConfig::default();
        config.database.path = Some(PathBuf::from("ledger.db"));
        config.ledger.stock_policy = StockPolicy::RejectNegative;
        config.ledger.walk_in_customer = "Counter Sale".to_string();

        let db = config.db_config().unwrap();
        assert_eq!(db.database_path, PathBuf::from("ledger.db"));
        assert_eq!(db.stock_policy, StockPolicy::RejectNegative);
        assert_eq!(db.walk_in_customer, "Counter Sale");
        assert_eq!(db.busy_timeout, Duration::from_millis(5000));
    }
}
