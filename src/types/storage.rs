use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Supported backend implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// In-memory tree (not persistent)
    #[default]
    Memory,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_storage_type_parsing() {
        assert_eq!(StorageType::from_str("memory").unwrap(), StorageType::Memory);
        assert_eq!(StorageType::from_str("MEMORY").unwrap(), StorageType::Memory);
        assert!(StorageType::from_str("file").is_err());
        assert_eq!(StorageType::Memory.to_string(), "memory");
    }
}
