//! Configuration validation for ArborDB
//!
//! This module contains functions for validating the configuration to ensure
//! all values are within acceptable ranges.

use super::error::ConfigError;
use super::{Config, IdConfig, StorageConfig};

/// Smallest accepted number of random characters in a push key.
pub const MIN_RANDOM_CHARS: u8 = 4;
/// Largest accepted number of random characters in a push key.
pub const MAX_RANDOM_CHARS: u8 = 24;

/// Validates the whole configuration, section by section.
///
/// # Errors
///
/// Returns a `ConfigError` describing the first failing check.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    validate_storage_config(&config.storage)?;
    validate_id_config(&config.ids)?;
    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.max_transaction_retries == 0 {
        return Err(ConfigError::invalid_value(
            "storage.max_transaction_retries",
            config.max_transaction_retries,
            "max_transaction_retries must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_id_config(config: &IdConfig) -> Result<(), ConfigError> {
    if !(MIN_RANDOM_CHARS..=MAX_RANDOM_CHARS).contains(&config.random_chars) {
        return Err(ConfigError::invalid_value(
            "ids.random_chars",
            config.random_chars,
            format!(
                "random_chars must be between {} and {}",
                MIN_RANDOM_CHARS, MAX_RANDOM_CHARS
            ),
        ));
    }
    Ok(())
}
