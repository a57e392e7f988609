// src/test_utils.rs

//! Helpers shared by unit and integration tests.

use crate::config::Config;
use crate::core::Database;
use crate::storage::memory::MemoryBackend;
use crate::StorageType;
use std::sync::{Arc, OnceLock};

/// Provides a common test configuration: in-memory storage with a small
/// transaction retry budget.
pub fn get_test_config() -> &'static Config {
    static TEST_CONFIG: OnceLock<Config> = OnceLock::new();
    TEST_CONFIG.get_or_init(|| {
        let mut config = Config::default();
        config.storage.storage_type = StorageType::Memory;
        config.storage.max_transaction_retries = 3;
        config
    })
}

/// A database on a fresh memory backend. The backend handle is returned too
/// so tests can inject failures.
pub fn test_database() -> (Database, MemoryBackend) {
    let config = get_test_config().clone();
    let backend = MemoryBackend::with_config(&config.storage);
    let db = Database::new(Arc::new(backend.clone()), config);
    (db, backend)
}
