//! Client configuration: TOML file, then `ARBOR_*` environment overrides,
//! then validation.

mod error;
pub mod validation;

#[cfg(test)]
#[path = "tests/validation_tests.rs"]
mod validation_tests;

#[cfg(test)]
#[path = "tests/config_mod_tests.rs"]
mod config_mod_tests;

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::types::{LogLevel, StorageType};

pub use error::ConfigError;

const ENV_PREFIX: &str = "ARBOR_";
const APP_NAME: &str = "arbordb";

/// Settings for a client process. Every section may be omitted from the
/// file; missing sections take their defaults.
///
/// ```no_run
/// use arbordb::config::Config;
///
/// let config = Config::load("arbordb.toml").unwrap();
/// assert!(config.storage.max_transaction_retries > 0);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub query: QueryConfig,
    pub ids: IdConfig,
}

/// Console logger installed by [`crate::init`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: LogLevel,
    /// Install an `env_logger` writing to stderr.
    pub console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            console: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(rename = "type")]
    pub storage_type: StorageType,
    /// How often a transaction is re-run after a concurrent change before it fails
    pub max_transaction_retries: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: StorageType::Memory,
            max_transaction_retries: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Whether queries return snapshots (values) rather than references by default
    pub default_snapshots: bool,
    /// Largest `take` a query may request (0 = unbounded)
    pub max_take: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_snapshots: true,
            max_take: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdConfig {
    /// Random characters after the time and counter parts of a push key
    pub random_chars: u8,
}

impl Default for IdConfig {
    fn default() -> Self {
        Self { random_chars: 8 }
    }
}

impl Config {
    /// Reads `path`, falling back to defaults when it does not exist, then
    /// applies environment overrides and validates the result.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let mut config = match fs::read_to_string(path) {
            Ok(text) => toml::from_str::<Config>(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("[Config] No file at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => return Err(ConfigError::unreadable(path, e)),
        };

        config.apply_env_vars()?;
        config.validate()?;
        Ok(config)
    }

    /// Overrides settings from `ARBOR_<SECTION>_<FIELD>` variables, e.g.
    /// `ARBOR_LOGGING_LEVEL=debug`. Unknown variables are ignored.
    pub fn apply_env_vars(&mut self) -> Result<(), ConfigError> {
        for (key, value) in env::vars() {
            let Some(stripped) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            if value.trim().is_empty() {
                continue;
            }
            match stripped.to_lowercase().as_str() {
                "logging_level" => {
                    self.logging.level = value.parse().map_err(|_| {
                        ConfigError::invalid_value("logging.level", &value, "expected off, error, warn, info, debug or trace")
                    })?;
                }
                "storage_max_transaction_retries" => {
                    self.storage.max_transaction_retries = value.parse().map_err(|_| {
                        ConfigError::invalid_value(
                            "storage.max_transaction_retries",
                            &value,
                            "expected a non-negative integer",
                        )
                    })?;
                }
                "query_max_take" => {
                    self.query.max_take = value.parse().map_err(|_| {
                        ConfigError::invalid_value("query.max_take", &value, "expected a non-negative integer")
                    })?;
                }
                _ => {}
            }
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validation::validate_config(self)
    }

    /// Per-user config directory, e.g. `$HOME/.config/arbordb` on Linux.
    pub fn config_dir() -> Option<PathBuf> {
        ProjectDirs::from("com", "arbordb", APP_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
    }
}
