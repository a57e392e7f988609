use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to produce a usable [`Config`](super::Config).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("cannot read config file {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file is not valid TOML or does not fit the config layout.
    #[error("malformed config file: {0}")]
    Malformed(#[from] toml::de::Error),

    /// A setting was read but holds an unusable value.
    #[error("invalid setting {field} = '{value}': {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl std::fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        ConfigError::InvalidValue {
            field: field.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unreadable(path: &std::path::Path, source: io::Error) -> Self {
        ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        }
    }
}
