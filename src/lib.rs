// src/lib.rs

//! Client-side data access for a hierarchical database.
//!
//! Values live in a tree addressed by `/`-separated paths. A [`Database`]
//! hands out [`DataReference`]s that read, write, query and subscribe to
//! paths through an injected [`Backend`](storage::Backend). Values travel to
//! the backend as transport [`Envelope`](transport::Envelope)s that keep
//! dates, binary data and path links intact.

pub mod config;
pub mod core;
pub mod error;
pub mod path;
pub mod query;
pub mod storage;
pub mod transport;
pub mod types;

#[cfg(feature = "memory-backend")]
pub mod test_utils;

pub use crate::config::Config;
pub use crate::core::{
    event_callback, DataReference, DataSnapshot, Database, EventCallback, EventStream,
};
pub use crate::error::{ArborError, Result};
pub use crate::path::PathKey;
pub use crate::query::{Query, QueryOperator};
pub use crate::types::{EventKind, LogLevel, PathReference, StorageType, Value};

/// Name of the configuration file looked up in [`Config::config_dir`].
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Loads the configuration and sets up logging.
///
/// With no explicit path, `config.toml` in the platform configuration
/// directory is used; a missing file yields the defaults.
///
/// # Errors
///
/// Fails if the configuration cannot be loaded, or with
/// [`ArborError::Validation`] if console logging is enabled and a logger is
/// already installed.
pub fn init(config_path: Option<&str>) -> Result<Config> {
    let config = match config_path {
        Some(path) => Config::load(path)?,
        None => match Config::config_dir() {
            Some(dir) => Config::load(dir.join(CONFIG_FILE_NAME))?,
            None => {
                let mut config = Config::default();
                config.apply_env_vars()?;
                config.validate()?;
                config
            }
        },
    };

    #[cfg(feature = "logging")]
    if config.logging.console {
        env_logger::Builder::new()
            .filter_level(config.logging.level.to_level_filter())
            .try_init()
            .map_err(|e| ArborError::validation(format!("logger already initialized: {}", e)))?;
    }

    log::info!(
        "[arbordb] Initialized with {} backend, log level {}",
        config.storage.storage_type,
        config.logging.level
    );
    Ok(config)
}
