// src/core/reference.rs

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::core::database::Database;
use crate::core::snapshot::DataSnapshot;
use crate::core::stream::EventStream;
use crate::error::{ArborError, Result};
use crate::path::{self, PathKey};
use crate::query::Query;
use crate::storage::{self, EventHandler, EventPayload, GetOptions};
use crate::transport::{self, Envelope};
use crate::types::{EventKind, Value};

/// Callback attached to an event subscription. Callbacks are identified by
/// the allocation they point to, so keep a clone to pass to
/// [`DataReference::off`].
pub type EventCallback = Arc<dyn Fn(&DataSnapshot) + Send + Sync>;

/// Wraps a closure as an [`EventCallback`].
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(&DataSnapshot) + Send + Sync + 'static,
{
    Arc::new(f)
}

static NEXT_REGISTRATION_ID: AtomicU64 = AtomicU64::new(1);

struct Registration {
    id: u64,
    event: EventKind,
    callback: Option<EventCallback>,
    handler: EventHandler,
    stream: EventStream<DataSnapshot>,
}

struct ReferenceState {
    path: String,
    key: PathKey,
    push_created: bool,
    registrations: Mutex<Vec<Registration>>,
}

/// Handle to one path in the database.
///
/// Clones share their event registrations. References are cheap; creating
/// one never touches the backend.
#[derive(Clone)]
pub struct DataReference {
    db: Database,
    state: Arc<ReferenceState>,
}

impl DataReference {
    pub(crate) fn new(db: Database, path: &str) -> Self {
        Self::with_origin(db, path, false)
    }

    fn with_origin(db: Database, path: &str, push_created: bool) -> Self {
        let path = path::normalize(path).to_string();
        let key = path::key_of(&path);
        Self {
            db,
            state: Arc::new(ReferenceState {
                path,
                key,
                push_created,
                registrations: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn path(&self) -> &str {
        &self.state.path
    }

    /// The trailing key; empty name for the root.
    pub fn key(&self) -> PathKey {
        self.state.key.clone()
    }

    pub fn is_root(&self) -> bool {
        self.state.path.is_empty()
    }

    /// Whether this reference was returned by [`push`](Self::push).
    pub fn is_push_created(&self) -> bool {
        self.state.push_created
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// The parent reference, or `None` for the root.
    pub fn parent(&self) -> Option<DataReference> {
        path::parent(self.path()).map(|p| DataReference::new(self.db.clone(), &p))
    }

    pub fn child(&self, rel: &str) -> DataReference {
        DataReference::new(self.db.clone(), &path::child(self.path(), rel))
    }

    pub(crate) fn child_at(&self, key: &PathKey) -> DataReference {
        DataReference::new(self.db.clone(), &path::child_key(self.path(), key))
    }

    /// Replaces the value at this path. Writing [`Value::Null`] deletes the
    /// node; passing no value at all is rejected.
    pub async fn set(&self, value: impl Into<Option<Value>>) -> Result<DataReference> {
        let value = value
            .into()
            .ok_or_else(|| ArborError::validation("cannot store an absent value, use null to remove"))?;
        if self.is_root() {
            return Err(ArborError::validation("cannot replace the root node"));
        }
        let value = self.db.types().serialize(self.path(), value)?;
        value.check_keys()?;
        self.db
            .backend()
            .set(self.path(), transport::serialize(&value))
            .await?;
        Ok(self.clone())
    }

    /// Merges the children of `updates` into this node. Anything other than
    /// an object replaces the node like [`set`](Self::set).
    pub async fn update(&self, updates: Value) -> Result<DataReference> {
        if !updates.is_object() {
            return self.set(updates).await;
        }
        let updates = self.db.types().serialize(self.path(), updates)?;
        updates.check_keys()?;
        self.db
            .backend()
            .update(self.path(), transport::serialize(&updates))
            .await?;
        Ok(self.clone())
    }

    /// Atomically rewrites this node from its current value. `updater` may
    /// run more than once; returning `None` cancels the transaction.
    pub async fn transaction<F, Fut>(&self, updater: F) -> Result<DataReference>
    where
        F: Fn(DataSnapshot) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<Value>> + Send + 'static,
    {
        if self.is_root() {
            return Err(ArborError::validation("cannot run a transaction on the root node"));
        }
        let db = self.db.clone();
        let path = self.path().to_string();
        let updater = Arc::new(updater);
        let backend_updater = storage::transaction_updater(move |current: Envelope| {
            let db = db.clone();
            let path = path.clone();
            let updater = updater.clone();
            async move {
                let value = db.types().deserialize(&path, transport::deserialize(current)?)?;
                let snapshot = DataSnapshot::new(DataReference::new(db.clone(), &path), value);
                match updater(snapshot).await {
                    Some(next) => {
                        let next = db.types().serialize(&path, next)?;
                        next.check_keys()?;
                        Ok(Some(transport::serialize(&next)))
                    }
                    None => Ok(None),
                }
            }
        });
        self.db
            .backend()
            .transaction(self.path(), backend_updater)
            .await?;
        Ok(self.clone())
    }

    /// Returns a reference to a new child with a generated key. Nothing is
    /// written.
    pub fn push(&self) -> DataReference {
        let key = self.db.generate_id();
        DataReference::with_origin(self.db.clone(), &path::child(self.path(), &key), true)
    }

    /// Stores `value` under a new child with a generated key.
    pub async fn push_with(&self, value: Value) -> Result<DataReference> {
        let child = self.push();
        child.set(value).await?;
        Ok(child)
    }

    pub async fn remove(&self) -> Result<()> {
        if self.is_root() {
            return Err(ArborError::validation("cannot remove the root node"));
        }
        self.set(Value::Null).await?;
        Ok(())
    }

    pub async fn exists(&self) -> Result<bool> {
        self.db.backend().exists(self.path()).await
    }

    pub async fn get(&self) -> Result<DataSnapshot> {
        self.get_with(&GetOptions::default()).await
    }

    /// Reads this node, shaped by `options`.
    pub async fn get_with(&self, options: &GetOptions) -> Result<DataSnapshot> {
        let envelope = self.db.backend().get(self.path(), options).await?;
        let value = self
            .db
            .types()
            .deserialize(self.path(), transport::deserialize(envelope)?)?;
        Ok(DataSnapshot::new(self.clone(), value))
    }

    /// Waits for the next `event` on this path. A value event resolves with
    /// the current value right away.
    pub async fn once(&self, event: EventKind) -> Result<DataSnapshot> {
        self.once_with(event, &GetOptions::default()).await
    }

    /// Like [`once`](Self::once); `options` shape the value read for value
    /// events.
    pub async fn once_with(&self, event: EventKind, options: &GetOptions) -> Result<DataSnapshot> {
        if event == EventKind::Value {
            return self.get_with(options).await;
        }
        let stream = EventStream::new();
        let mut receiver = stream.receiver();
        let id = self.register(event, None, stream)?;
        let snapshot = receiver.recv().await;
        self.detach(id)?;
        snapshot.ok_or_else(|| {
            ArborError::delivery(format!("{} subscription on '{}' ended", event, self.path()))
        })
    }

    /// Subscribes to `event` on this path.
    ///
    /// With a callback, the callback is attached to the returned stream and
    /// the current state is replayed to it first: the node itself for value
    /// events, every existing child for child_added events. Without a
    /// callback nothing is replayed; consume the stream instead.
    pub async fn on(
        &self,
        event: EventKind,
        callback: Option<EventCallback>,
    ) -> Result<EventStream<DataSnapshot>> {
        let stream = EventStream::new();
        if let Some(callback) = &callback {
            stream.subscribe_arc(callback.clone());
        }
        let replay = callback.is_some();
        self.register(event, callback, stream.clone())?;
        if replay {
            self.replay(event, &stream).await;
        }
        Ok(stream)
    }

    /// Removes subscriptions made through this reference. With a callback,
    /// only the registration carrying that callback goes; without one, every
    /// registration for `event` (or for all events when `event` is `None`).
    pub fn off(&self, event: Option<EventKind>, callback: Option<&EventCallback>) -> Result<()> {
        let removed: Vec<Registration> = {
            let mut registrations = self.state.registrations.lock();
            let selected = |reg: &Registration| {
                event.map_or(true, |e| e == reg.event)
                    && callback.map_or(true, |cb| {
                        reg.callback.as_ref().map_or(false, |own| same_callback(own, cb))
                    })
            };
            let (removed, kept): (Vec<_>, Vec<_>) =
                registrations.drain(..).partition(|reg| selected(reg));
            *registrations = kept;
            removed
        };

        if removed.is_empty() && callback.is_some() {
            let err = ArborError::RegistrationNotFound(format!(
                "no subscription with this callback on '{}'",
                self.path()
            ));
            log::warn!("[DataReference] off: {}", err);
            return Ok(());
        }

        let mut first_error = None;
        for reg in removed {
            reg.stream.stop();
            if let Err(e) = self
                .db
                .backend()
                .unsubscribe(self.path(), reg.event, Some(&reg.handler))
            {
                log::error!(
                    "[DataReference] Failed to unsubscribe {} on '{}': {}",
                    reg.event,
                    self.path(),
                    e
                );
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Number of live registrations made through this reference.
    pub fn registration_count(&self) -> usize {
        self.state.registrations.lock().len()
    }

    pub fn query(&self) -> Query {
        Query::new(self.clone())
    }

    fn register(
        &self,
        event: EventKind,
        callback: Option<EventCallback>,
        stream: EventStream<DataSnapshot>,
    ) -> Result<u64> {
        let id = NEXT_REGISTRATION_ID.fetch_add(1, Ordering::Relaxed);
        let handler = self.event_handler(event, id, callback.is_some(), stream.clone());
        self.state.registrations.lock().push(Registration {
            id,
            event,
            callback,
            handler: handler.clone(),
            stream,
        });

        if let Err(e) = self.db.backend().subscribe(self.path(), event, handler) {
            self.state.registrations.lock().retain(|reg| reg.id != id);
            return Err(e);
        }
        log::debug!("[DataReference] Subscribed to {} on '{}'", event, self.path());
        Ok(id)
    }

    fn event_handler(
        &self,
        event: EventKind,
        registration: u64,
        has_callback: bool,
        stream: EventStream<DataSnapshot>,
    ) -> EventHandler {
        let db = self.db.clone();
        let path = self.path().to_string();
        let owner: Weak<ReferenceState> = Arc::downgrade(&self.state);
        EventHandler::new(move |result| {
            let payload = match result {
                Ok(payload) => payload,
                Err(e) => {
                    log::error!("[DataReference] {} event on '{}' failed: {}", event, path, e);
                    return;
                }
            };
            let snapshot = match event_snapshot(&db, event, payload) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    log::error!(
                        "[DataReference] Dropping undecodable {} event on '{}': {}",
                        event,
                        path,
                        e
                    );
                    return;
                }
            };
            if !stream.publish(snapshot) && !has_callback {
                if let Some(state) = owner.upgrade() {
                    let reference = DataReference {
                        db: db.clone(),
                        state,
                    };
                    if let Err(e) = reference.detach(registration) {
                        log::warn!(
                            "[DataReference] Could not drop idle {} subscription on '{}': {}",
                            event,
                            path,
                            e
                        );
                    }
                }
            }
        })
    }

    fn detach(&self, registration: u64) -> Result<()> {
        let removed = {
            let mut registrations = self.state.registrations.lock();
            registrations
                .iter()
                .position(|reg| reg.id == registration)
                .map(|index| registrations.remove(index))
        };
        match removed {
            Some(reg) => {
                reg.stream.stop();
                self.db
                    .backend()
                    .unsubscribe(self.path(), reg.event, Some(&reg.handler))
            }
            None => Ok(()),
        }
    }

    async fn replay(&self, event: EventKind, stream: &EventStream<DataSnapshot>) {
        let current = match event {
            EventKind::Value | EventKind::ChildAdded => self.get().await,
            EventKind::ChildChanged | EventKind::ChildRemoved => return,
        };
        let snapshot = match current {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::error!(
                    "[DataReference] Initial read for {} on '{}' failed: {}",
                    event,
                    self.path(),
                    e
                );
                return;
            }
        };
        if event == EventKind::Value {
            stream.publish(snapshot);
            return;
        }
        snapshot.for_each(|child| {
            stream.publish(child);
            true
        });
    }
}

impl fmt::Debug for DataReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataReference")
            .field("path", &self.path())
            .finish()
    }
}

fn same_callback(a: &EventCallback, b: &EventCallback) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Builds the snapshot delivered for one backend event. Removal events carry
/// the removed value; all others carry the new value, with the old one kept
/// as `previous`.
fn event_snapshot(db: &Database, event: EventKind, payload: EventPayload) -> Result<DataSnapshot> {
    let EventPayload {
        path,
        old_value,
        new_value,
    } = payload;
    let types = db.types();
    let reference = DataReference::new(db.clone(), &path);
    if event == EventKind::ChildRemoved {
        let removed = types.deserialize(&path, transport::deserialize(old_value)?)?;
        return Ok(DataSnapshot::new(reference, removed));
    }
    let current = types.deserialize(&path, transport::deserialize(new_value)?)?;
    let previous = types.deserialize(&path, transport::deserialize(old_value)?)?;
    Ok(DataSnapshot::new(reference, current).with_previous(previous))
}
