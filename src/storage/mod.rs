//! Backend capability.
//!
//! References and queries never touch storage directly: every read, write,
//! query and subscription goes through an injected [`Backend`]. Values cross
//! this boundary in transport form ([`Envelope`]).

#[cfg(feature = "memory-backend")]
pub mod memory;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Result;
use crate::query::QueryDescriptor;
use crate::transport::Envelope;
use crate::types::{EventKind, StorageType};

/// Options for reading a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetOptions {
    /// Only these child keys are returned (empty = all)
    pub include: Vec<String>,
    /// These child keys are left out
    pub exclude: Vec<String>,
    /// Whether children that are objects or arrays are returned
    pub child_objects: bool,
}

impl Default for GetOptions {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
            child_objects: true,
        }
    }
}

/// Options for executing a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    /// Return matched values, not only their paths
    pub snapshots: bool,
    /// Shape of returned values when `snapshots` is set
    pub value: GetOptions,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            snapshots: true,
            value: GetOptions::default(),
        }
    }
}

/// One query result. `value` is present only when snapshots were requested.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryMatch {
    pub path: String,
    pub value: Option<Envelope>,
}

/// A declared index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub path: String,
    pub key: String,
}

/// Raw event data as reported by a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct EventPayload {
    /// Path the event is about; for child events this is the child's path
    pub path: String,
    pub old_value: Envelope,
    pub new_value: Envelope,
}

/// What a subscription handler receives: event data or a delivery failure.
pub type EventResult = Result<EventPayload>;

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

/// A subscription handler registered with a backend. Handlers are compared by
/// identity: clones of one handler are equal, separately created ones are not.
#[derive(Clone)]
pub struct EventHandler {
    id: u64,
    callback: Arc<dyn Fn(EventResult) + Send + Sync>,
}

impl EventHandler {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(EventResult) + Send + Sync + 'static,
    {
        Self {
            id: NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed),
            callback: Arc::new(callback),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn call(&self, event: EventResult) {
        (self.callback)(event)
    }
}

impl PartialEq for EventHandler {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventHandler {}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandler").field("id", &self.id).finish()
    }
}

/// Callback a backend runs inside a transaction: receives the current value
/// and returns the value to commit, or `None` to cancel. May be invoked more
/// than once.
pub type TransactionUpdater =
    Arc<dyn Fn(Envelope) -> BoxFuture<'static, Result<Option<Envelope>>> + Send + Sync>;

/// Wraps an async closure as a [`TransactionUpdater`].
pub fn transaction_updater<F, Fut>(f: F) -> TransactionUpdater
where
    F: Fn(Envelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<Envelope>>> + Send + 'static,
{
    Arc::new(move |current: Envelope| f(current).boxed())
}

/// Storage, query and subscription capability consumed by references and
/// queries. Implemented by embedded or networked engines.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Reads the value at `path`. A missing node reads as null.
    async fn get(&self, path: &str, options: &GetOptions) -> Result<Envelope>;

    /// Replaces the value at `path`. A null value deletes the node.
    async fn set(&self, path: &str, value: Envelope) -> Result<()>;

    /// Merges the children in `updates` into the node at `path`. Null
    /// children are deleted.
    async fn update(&self, path: &str, updates: Envelope) -> Result<()>;

    async fn exists(&self, path: &str) -> Result<bool>;

    /// Registers `handler` for `event` on `path`. Registration is complete
    /// when this returns.
    fn subscribe(&self, path: &str, event: EventKind, handler: EventHandler) -> Result<()>;

    /// Removes subscriptions on `path`: the given handler only, or every
    /// handler for `event` if no handler is given.
    fn unsubscribe(&self, path: &str, event: EventKind, handler: Option<&EventHandler>) -> Result<()>;

    /// Read-modify-write of `path` that commits only if the node was not
    /// changed since it was read, re-running `updater` otherwise.
    async fn transaction(&self, path: &str, updater: TransactionUpdater) -> Result<()>;

    /// Executes `query` over the children of `path`, in result order.
    async fn query(
        &self,
        path: &str,
        query: &QueryDescriptor,
        options: &QueryOptions,
    ) -> Result<Vec<QueryMatch>>;

    async fn get_indexes(&self) -> Result<Vec<IndexInfo>>;

    async fn create_index(&self, path: &str, key: &str) -> Result<IndexInfo>;
}

/// Creates the backend selected by the configuration.
pub fn create_backend(config: &Config) -> Result<Arc<dyn Backend>> {
    match config.storage.storage_type {
        #[cfg(feature = "memory-backend")]
        StorageType::Memory => Ok(Arc::new(memory::MemoryBackend::with_config(&config.storage))),
        #[cfg(not(feature = "memory-backend"))]
        StorageType::Memory => Err(crate::error::ArborError::not_supported(
            "memory backend requires the `memory-backend` feature",
        )),
    }
}
