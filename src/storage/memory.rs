// src/storage/memory.rs

use async_trait::async_trait;
use dashmap::DashMap;
use log::{debug, warn};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

use crate::config::StorageConfig;
use crate::error::{ArborError, Result};
use crate::path::{self, PathInfo, PathKey};
use crate::query::{matcher, QueryDescriptor};
use crate::storage::{
    Backend, EventHandler, EventPayload, GetOptions, IndexInfo, QueryMatch, QueryOptions,
    TransactionUpdater,
};
use crate::transport::{self, Envelope};
use crate::types::{EventKind, Value};

type Subscriptions = DashMap<String, Vec<(EventKind, EventHandler)>>;

/// An in-memory backend holding the whole tree, primarily for testing or
/// ephemeral use.
///
/// The tree is kept behind a `RwLock`; subscriptions live in a `DashMap`
/// keyed by normalized path. Handlers are always invoked after every lock has
/// been released, so a handler may subscribe, unsubscribe or read.
///
/// It also includes a mechanism to simulate write failures for testing error
/// handling paths, configurable via `set_fail_on_write`.
#[derive(Clone)]
pub struct MemoryBackend {
    root: Arc<RwLock<Value>>,
    subscriptions: Arc<Subscriptions>,
    indexes: Arc<RwLock<Vec<IndexInfo>>>,
    fail_on_write: Arc<Mutex<Option<PathInfo>>>,
    max_transaction_retries: u32,
}

impl MemoryBackend {
    /// Creates a new, empty `MemoryBackend` with default settings.
    pub fn new() -> Self {
        Self::with_config(&StorageConfig::default())
    }

    pub fn with_config(config: &StorageConfig) -> Self {
        Self {
            root: Arc::new(RwLock::new(Value::object())),
            subscriptions: Arc::new(DashMap::new()),
            indexes: Arc::new(RwLock::new(Vec::new())),
            fail_on_write: Arc::new(Mutex::new(None)),
            max_transaction_retries: config.max_transaction_retries,
        }
    }

    /// Makes every write on or below `path` fail until cleared.
    pub fn set_fail_on_write(&self, path: &str) {
        *self.fail_on_write.lock() = Some(PathInfo::new(path));
    }

    /// Clears any previously set failure condition.
    pub fn clear_fail_on_write(&self) {
        *self.fail_on_write.lock() = None;
    }

    /// Delivers an error instead of event data to every handler on `path`.
    pub fn emit_error(&self, path: &str, message: &str) {
        let handlers: Vec<EventHandler> = self
            .subscriptions
            .get(path::normalize(path))
            .map(|subs| subs.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();
        for handler in handlers {
            handler.call(Err(ArborError::delivery(message.to_string())));
        }
    }

    /// Number of handlers registered on `path`.
    pub fn subscription_count(&self, path: &str) -> usize {
        self.subscriptions
            .get(path::normalize(path))
            .map_or(0, |subs| subs.len())
    }

    /// Checks if the tree holds no data.
    pub fn is_empty(&self) -> bool {
        self.root
            .read()
            .as_object()
            .map_or(true, |fields| fields.is_empty())
    }

    /// Removes all data. Subscriptions are kept and are not notified.
    pub fn clear(&self) {
        *self.root.write() = Value::object();
    }

    fn read(&self, keys: &[PathKey]) -> Value {
        self.root.read().get_in(keys).cloned().unwrap_or_default()
    }

    fn check_writable(&self, path: &str) -> Result<()> {
        if let Some(fail) = self.fail_on_write.lock().as_ref() {
            let target = PathInfo::new(path);
            if fail == &target || fail.is_ancestor_of(&target) {
                return Err(ArborError::backend(format!(
                    "Simulated MemoryBackend write failure at '{}'",
                    path
                )));
            }
        }
        Ok(())
    }

    /// Applies `mutate` to the tree under the write lock, unless `expected`
    /// is given and the node at `path` no longer equals it. Returns the old
    /// and new tree when the change was applied.
    fn apply<F>(&self, path: &str, expected: Option<&Value>, mutate: F) -> Result<Option<(Value, Value)>>
    where
        F: FnOnce(&mut Value) -> Result<()>,
    {
        self.check_writable(path)?;
        let mut root = self.root.write();
        if let Some(expected) = expected {
            let keys = path::split_to_keys(path);
            let current = root.get_in(&keys).cloned().unwrap_or_default();
            if &current != expected {
                return Ok(None);
            }
        }
        let before = root.clone();
        let mut after = before.clone();
        mutate(&mut after)?;
        *root = after.clone();
        Ok(Some((before, after)))
    }

    fn dispatch(&self, written: &str, before: &Value, after: &Value) {
        let written = PathInfo::new(written);
        let mut deliveries: Vec<(EventHandler, EventPayload)> = Vec::new();

        for entry in self.subscriptions.iter() {
            let watched = PathInfo::new(entry.key());
            if !watched.is_on_trail_of(&written) {
                continue;
            }
            let old = before.get_in(watched.keys()).cloned().unwrap_or_default();
            let new = after.get_in(watched.keys()).cloned().unwrap_or_default();
            if old == new {
                continue;
            }
            let changes = child_changes(&old, &new);
            for (kind, handler) in entry.value() {
                match kind {
                    EventKind::Value => deliveries.push((
                        handler.clone(),
                        payload(watched.path().to_string(), &old, &new),
                    )),
                    child_kind => {
                        for (key, old_child, new_child) in &changes {
                            if classify(old_child, new_child) == *child_kind {
                                deliveries.push((
                                    handler.clone(),
                                    payload(path::child_key(watched.path(), key), old_child, new_child),
                                ));
                            }
                        }
                    }
                }
            }
        }

        debug!(
            "[MemoryBackend] Write at '{}' produced {} event deliveries",
            written.path(),
            deliveries.len()
        );
        for (handler, event) in deliveries {
            handler.call(Ok(event));
        }
    }

    fn commit(&self, path: &str, change: Option<(Value, Value)>) {
        if let Some((before, after)) = change {
            self.dispatch(path, &before, &after);
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn payload(path: String, old: &Value, new: &Value) -> EventPayload {
    EventPayload {
        path,
        old_value: transport::serialize(old),
        new_value: transport::serialize(new),
    }
}

fn classify(old: &Value, new: &Value) -> EventKind {
    match (old.is_null(), new.is_null()) {
        (true, _) => EventKind::ChildAdded,
        (_, true) => EventKind::ChildRemoved,
        _ => EventKind::ChildChanged,
    }
}

/// Direct children that differ between `old` and `new`.
fn child_changes(old: &Value, new: &Value) -> Vec<(PathKey, Value, Value)> {
    let mut keys: Vec<PathKey> = old
        .children()
        .into_iter()
        .chain(new.children())
        .map(|(key, _)| key)
        .collect();
    keys.sort();
    keys.dedup();
    keys.into_iter()
        .filter_map(|key| {
            let o = old.get(&key).cloned().unwrap_or_default();
            let n = new.get(&key).cloned().unwrap_or_default();
            (o != n).then_some((key, o, n))
        })
        .collect()
}

fn is_empty_container(value: &Value) -> bool {
    match value {
        Value::Object(fields) => fields.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn set_child(node: &mut Value, key: &PathKey, value: Value) -> Result<()> {
    match (node, key) {
        (Value::Object(fields), PathKey::Name(name)) => {
            if value.is_null() {
                fields.remove(name);
            } else {
                fields.insert(name.clone(), value);
            }
            Ok(())
        }
        (Value::Object(_), PathKey::Index(index)) => Err(ArborError::backend(format!(
            "cannot address object property by index [{}]",
            index
        ))),
        (Value::Array(items), PathKey::Index(index)) => {
            let index = *index;
            let len = items.len();
            if value.is_null() {
                // Removing an inner element would shift every later sibling.
                if index + 1 == len {
                    items.pop();
                } else if index < len {
                    return Err(ArborError::backend(format!(
                        "cannot remove element [{}] of an array of length {}, only the last one",
                        index, len
                    )));
                }
            } else if index < len {
                items[index] = value;
            } else if index == len {
                items.push(value);
            } else {
                return Err(ArborError::backend(format!(
                    "array index {} out of bounds (length {})",
                    index, len
                )));
            }
            Ok(())
        }
        (Value::Array(_), PathKey::Name(name)) => Err(ArborError::backend(format!(
            "cannot address array element by name '{}'",
            name
        ))),
        _ => Err(ArborError::backend("cannot add children to a leaf value")),
    }
}

/// Whether emptying the child at `key` may remove it from `node`. Only the
/// last element of an array can go.
fn can_prune(node: &Value, key: &PathKey) -> bool {
    match (node, key) {
        (Value::Array(items), PathKey::Index(index)) => index + 1 == items.len(),
        _ => true,
    }
}

/// Writes `value` at `keys` below `node`, creating intermediate containers.
/// Containers emptied by a deletion are removed as well.
fn write_node(node: &mut Value, keys: &[PathKey], value: Value) -> Result<()> {
    let Some((first, rest)) = keys.split_first() else {
        *node = if value.is_null() { Value::object() } else { value };
        return Ok(());
    };
    let deleting = value.is_null();
    if deleting && node.get(first).is_none() {
        return Ok(());
    }
    if !node.is_composite() {
        *node = match first {
            PathKey::Index(_) => Value::Array(Vec::new()),
            PathKey::Name(_) => Value::object(),
        };
    }
    if rest.is_empty() {
        return set_child(node, first, value);
    }
    let mut child = node.get(first).cloned().unwrap_or_default();
    write_node(&mut child, rest, value)?;
    if deleting && is_empty_container(&child) && can_prune(node, first) {
        child = Value::Null;
    }
    set_child(node, first, child)
}

/// Applies read options to a node.
fn shape(value: Value, options: &GetOptions) -> Value {
    match value {
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .filter(|(k, v)| {
                    (options.include.is_empty() || options.include.iter().any(|i| i == k))
                        && !options.exclude.iter().any(|e| e == k)
                        && (options.child_objects || !v.is_composite())
                })
                .collect(),
        ),
        other => other,
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn get(&self, path: &str, options: &GetOptions) -> Result<Envelope> {
        let value = self.read(&path::split_to_keys(path));
        Ok(transport::serialize(&shape(value, options)))
    }

    async fn set(&self, path: &str, value: Envelope) -> Result<()> {
        let value = transport::deserialize(value)?;
        let keys = path::split_to_keys(path);
        let change = self.apply(path, None, |root| write_node(root, &keys, value))?;
        self.commit(path, change);
        Ok(())
    }

    async fn update(&self, path: &str, updates: Envelope) -> Result<()> {
        let updates = match transport::deserialize(updates)? {
            Value::Object(fields) => fields,
            other => {
                return Err(ArborError::backend(format!(
                    "update requires an object, got {:?}",
                    other
                )))
            }
        };
        let keys = path::split_to_keys(path);
        let change = self.apply(path, None, |root| {
            for (name, value) in updates {
                let mut child_keys = keys.clone();
                child_keys.extend(path::split_to_keys(&name));
                write_node(root, &child_keys, value)?;
            }
            Ok(())
        })?;
        self.commit(path, change);
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(!self.read(&path::split_to_keys(path)).is_null())
    }

    fn subscribe(&self, path: &str, event: EventKind, handler: EventHandler) -> Result<()> {
        debug!("[MemoryBackend] Subscribing handler {} to {} on '{}'", handler.id(), event, path);
        self.subscriptions
            .entry(path::normalize(path).to_string())
            .or_default()
            .push((event, handler));
        Ok(())
    }

    fn unsubscribe(&self, path: &str, event: EventKind, handler: Option<&EventHandler>) -> Result<()> {
        let key = path::normalize(path);
        if let Some(mut subs) = self.subscriptions.get_mut(key) {
            subs.retain(|(kind, h)| !(*kind == event && handler.map_or(true, |target| target == h)));
        }
        self.subscriptions.remove_if(key, |_, subs| subs.is_empty());
        Ok(())
    }

    async fn transaction(&self, path: &str, updater: TransactionUpdater) -> Result<()> {
        let keys = path::split_to_keys(path);
        for attempt in 0..=self.max_transaction_retries {
            let current = self.read(&keys);
            let proposed = match updater(transport::serialize(&current)).await? {
                Some(envelope) => transport::deserialize(envelope)?,
                None => {
                    debug!("[MemoryBackend] Transaction on '{}' cancelled by updater", path);
                    return Ok(());
                }
            };
            let change = self.apply(path, Some(&current), |root| write_node(root, &keys, proposed))?;
            if change.is_some() {
                self.commit(path, change);
                return Ok(());
            }
            debug!(
                "[MemoryBackend] Transaction on '{}' saw a concurrent change, retrying (attempt {})",
                path,
                attempt + 1
            );
        }
        warn!("[MemoryBackend] Transaction on '{}' gave up after {} retries", path, self.max_transaction_retries);
        Err(ArborError::backend(format!(
            "transaction on '{}' did not commit after {} retries",
            path, self.max_transaction_retries
        )))
    }

    async fn query(
        &self,
        path: &str,
        query: &QueryDescriptor,
        options: &QueryOptions,
    ) -> Result<Vec<QueryMatch>> {
        let node = self.read(&path::split_to_keys(path));
        Ok(matcher::evaluate(query, &node)
            .into_iter()
            .map(|(key, value)| QueryMatch {
                path: path::child_key(path, &key),
                value: options
                    .snapshots
                    .then(|| transport::serialize(&shape(value.clone(), &options.value))),
            })
            .collect())
    }

    async fn get_indexes(&self) -> Result<Vec<IndexInfo>> {
        Ok(self.indexes.read().clone())
    }

    async fn create_index(&self, path: &str, key: &str) -> Result<IndexInfo> {
        let info = IndexInfo {
            path: path::normalize(path).to_string(),
            key: key.to_string(),
        };
        let mut indexes = self.indexes.write();
        if !indexes.contains(&info) {
            indexes.push(info.clone());
        }
        Ok(info)
    }
}
