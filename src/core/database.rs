// src/core/database.rs

use std::fmt;
use std::sync::Arc;

use crate::config::Config;
use crate::core::id::{IdGenerator, PushIdGenerator};
use crate::core::reference::DataReference;
use crate::core::type_mappings::{NoTypeMappings, TypeMappings};
use crate::error::Result;
use crate::query::Query;
use crate::storage::{self, Backend, IndexInfo};

#[derive(Clone)]
struct DatabaseInner {
    backend: Arc<dyn Backend>,
    types: Arc<dyn TypeMappings>,
    ids: Arc<dyn IdGenerator>,
    config: Config,
}

/// Entry point: binds a backend to the type mappings and key generator that
/// references created from it use. Cheap to clone.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

impl Database {
    pub fn new(backend: Arc<dyn Backend>, config: Config) -> Self {
        let ids = PushIdGenerator::new(config.ids.random_chars as usize);
        Self {
            inner: Arc::new(DatabaseInner {
                backend,
                types: Arc::new(NoTypeMappings),
                ids: Arc::new(ids),
                config,
            }),
        }
    }

    /// Opens a database on the backend selected by `config`.
    pub fn open(config: Config) -> Result<Self> {
        let backend = storage::create_backend(&config)?;
        log::debug!(
            "[Database] Opened {} backend",
            config.storage.storage_type
        );
        Ok(Self::new(backend, config))
    }

    pub fn with_type_mappings(mut self, types: Arc<dyn TypeMappings>) -> Self {
        Arc::make_mut(&mut self.inner).types = types;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        Arc::make_mut(&mut self.inner).ids = ids;
        self
    }

    pub fn reference(&self, path: &str) -> DataReference {
        DataReference::new(self.clone(), path)
    }

    pub fn root(&self) -> DataReference {
        self.reference("")
    }

    /// Query over the children of `path`.
    pub fn query(&self, path: &str) -> Query {
        self.reference(path).query()
    }

    pub async fn indexes(&self) -> Result<Vec<IndexInfo>> {
        self.inner.backend.get_indexes().await
    }

    pub async fn create_index(&self, path: &str, key: &str) -> Result<IndexInfo> {
        let index = self.inner.backend.create_index(path, key).await?;
        log::info!("[Database] Created index on '{}' for key '{}'", index.path, index.key);
        Ok(index)
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.inner.backend
    }

    pub fn types(&self) -> &Arc<dyn TypeMappings> {
        &self.inner.types
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub(crate) fn generate_id(&self) -> String {
        self.inner.ids.generate()
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
