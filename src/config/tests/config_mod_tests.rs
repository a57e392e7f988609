use super::*;
use serial_test::serial;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_config_default_values() {
    let cfg = Config::default();
    assert_eq!(cfg.logging.level, LogLevel::Info);
    assert_eq!(cfg.ids.random_chars, 8);
    assert_eq!(cfg.query.max_take, 0);
}

#[test]
#[serial]
fn test_load_existing_file_and_missing_file() {
    let dir = tempdir().expect("create temp dir");
    let mut cfg = Config::default();
    cfg.logging.level = LogLevel::Debug;
    cfg.storage.max_transaction_retries = 3;

    let toml_string = toml::to_string(&cfg).expect("serialize config");
    let config_path = dir.path().join("cfg.toml");
    fs::write(&config_path, toml_string).unwrap();

    let loaded = Config::load(&config_path).expect("load existing config");
    assert_eq!(loaded.logging.level, LogLevel::Debug);
    assert_eq!(loaded.storage.max_transaction_retries, 3);

    // Nonexistent file should fall back to defaults
    let missing_path = dir.path().join("missing.toml");
    let default_loaded = Config::load(&missing_path).expect("load missing");
    assert_eq!(default_loaded.storage.max_transaction_retries, 10);
}

#[test]
#[serial]
fn test_partial_file_uses_section_defaults() {
    let dir = tempdir().expect("create temp dir");
    let config_path = dir.path().join("partial.toml");
    fs::write(&config_path, "[query]\ndefault_snapshots = false\nmax_take = 50\n").unwrap();

    let loaded = Config::load(&config_path).expect("load partial config");
    assert!(!loaded.query.default_snapshots);
    assert_eq!(loaded.query.max_take, 50);
    assert_eq!(loaded.storage.storage_type, StorageType::Memory);
}

#[test]
fn test_load_invalid_toml_fails() {
    let dir = tempdir().expect("create temp dir");
    let invalid_path = dir.path().join("bad.toml");
    fs::write(&invalid_path, "not = [valid\n").unwrap();

    let err = Config::load(&invalid_path).unwrap_err();
    assert!(matches!(err, ConfigError::Malformed(_)));
    assert!(err.to_string().starts_with("malformed config file"));
}

#[test]
#[serial]
fn test_apply_env_vars() {
    std::env::set_var("ARBOR_LOGGING_LEVEL", "debug");
    std::env::set_var("ARBOR_QUERY_MAX_TAKE", "25");
    let mut cfg = Config::default();
    cfg.apply_env_vars().unwrap();
    assert_eq!(cfg.logging.level, LogLevel::Debug);
    assert_eq!(cfg.query.max_take, 25);
    std::env::remove_var("ARBOR_LOGGING_LEVEL");
    std::env::remove_var("ARBOR_QUERY_MAX_TAKE");

    std::env::set_var("ARBOR_STORAGE_MAX_TRANSACTION_RETRIES", "many");
    let mut cfg = Config::default();
    assert!(matches!(cfg.apply_env_vars(), Err(ConfigError::InvalidValue { .. })));
    std::env::remove_var("ARBOR_STORAGE_MAX_TRANSACTION_RETRIES");
}

#[test]
fn test_config_dir_mentions_app_name() {
    if let Some(dir) = Config::config_dir() {
        assert!(dir.to_string_lossy().to_lowercase().contains("arbordb"));
    }
}
