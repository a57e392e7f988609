use crate::config::validation::{validate_config, MAX_RANDOM_CHARS, MIN_RANDOM_CHARS};
use crate::config::{Config, ConfigError};

#[test]
fn test_valid_default_config() {
    assert!(validate_config(&Config::default()).is_ok());
}

#[test]
fn test_zero_transaction_retries_rejected() {
    let mut config = Config::default();
    config.storage.max_transaction_retries = 0;
    match validate_config(&config) {
        Err(ConfigError::InvalidValue { field, .. }) => {
            assert_eq!(field, "storage.max_transaction_retries")
        }
        other => panic!("expected InvalidValue, got {:?}", other),
    }
}

#[test]
fn test_random_chars_bounds() {
    let mut config = Config::default();
    config.ids.random_chars = MIN_RANDOM_CHARS;
    assert!(validate_config(&config).is_ok());
    config.ids.random_chars = MAX_RANDOM_CHARS;
    assert!(validate_config(&config).is_ok());
    config.ids.random_chars = MIN_RANDOM_CHARS - 1;
    assert!(validate_config(&config).is_err());
    config.ids.random_chars = MAX_RANDOM_CHARS + 1;
    assert!(validate_config(&config).is_err());
}
