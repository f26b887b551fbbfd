//! Configuration management for postshield.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::aggregate::{CrimeAggregator, UnlabeledPolicy};
use crate::error::{Error, Result};
use crate::proximity::DEFAULT_TOLERANCE;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "postshield";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "postshield.db";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `POSTSHIELD_`, sections split
///    on `__`, e.g. `POSTSHIELD_AGGREGATION__TOLERANCE`)
/// 2. TOML config file at `~/.config/postshield/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Aggregation configuration.
    pub aggregation: AggregationConfig,
    /// Feed configuration.
    pub feed: FeedConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/postshield/postshield.db`
    pub database_path: Option<PathBuf>,
}

/// Crime level aggregation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Per-axis tolerance in degrees.
    pub tolerance: f64,
    /// Treatment of matched posts without a crime level.
    pub unlabeled: UnlabeledPolicy,
}

/// Feed settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Entries shown per page when no limit is given.
    pub page_size: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            unlabeled: UnlabeledPolicy::CountAsZero,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self { page_size: 20 }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("POSTSHIELD_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let tolerance = self.aggregation.tolerance;
        if !tolerance.is_finite() || tolerance <= 0.0 {
            return Err(Error::ConfigValidation {
                message: format!("aggregation.tolerance must be a positive number, got {tolerance}"),
            });
        }

        if self.feed.page_size == 0 {
            return Err(Error::ConfigValidation {
                message: "feed.page_size must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Build the aggregator described by this configuration.
    #[must_use]
    pub fn aggregator(&self) -> CrimeAggregator {
        CrimeAggregator::new()
            .with_tolerance(self.aggregation.tolerance)
            .with_unlabeled_policy(self.aggregation.unlabeled)
    }
}
