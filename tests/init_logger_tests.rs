use arbordb::config::Config;
use arbordb::{init, ArborError};
use serial_test::serial;
use std::fs;
use tempfile::tempdir;

fn write_config(console: bool) -> (tempfile::TempDir, String) {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("cfg.toml");
    let mut cfg = Config::default();
    cfg.logging.console = console;
    fs::write(&config_path, toml::to_string(&cfg).unwrap()).unwrap();
    let path = config_path.to_str().unwrap().to_string();
    (dir, path)
}

#[test]
#[serial]
fn test_init_fails_when_logger_already_set() {
    // Pre-initialize logger
    let _ = env_logger::builder().is_test(true).try_init();

    let (_dir, path) = write_config(true);
    let result = init(Some(&path));
    assert!(matches!(result, Err(ArborError::Validation(_))));
}

#[test]
#[serial]
fn test_init_without_console_logging_loads_config() {
    let (_dir, path) = write_config(false);
    let config = init(Some(&path)).unwrap();
    assert!(!config.logging.console);
    assert!(config.query.default_snapshots);
}

#[test]
#[serial]
fn test_init_rejects_malformed_config() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("broken.toml");
    fs::write(&config_path, "[storage]\nmax_transaction_retries = \"many\"\n").unwrap();
    let result = init(Some(config_path.to_str().unwrap()));
    assert!(matches!(result, Err(ArborError::Config(_))));
}
