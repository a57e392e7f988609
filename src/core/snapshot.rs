// src/core/snapshot.rs

use std::fmt;

use crate::core::reference::DataReference;
use crate::path::{self, PathKey};
use crate::types::Value;

/// Immutable value read from a path, together with the reference it was
/// read from.
#[derive(Clone)]
pub struct DataSnapshot {
    reference: DataReference,
    value: Value,
    previous: Option<Value>,
}

impl DataSnapshot {
    pub fn new(reference: DataReference, value: Value) -> Self {
        Self {
            reference,
            value,
            previous: None,
        }
    }

    pub(crate) fn with_previous(mut self, previous: Value) -> Self {
        self.previous = Some(previous);
        self
    }

    pub fn reference(&self) -> &DataReference {
        &self.reference
    }

    pub fn key(&self) -> PathKey {
        self.reference.key()
    }

    /// The value; null if the node does not exist.
    pub fn val(&self) -> &Value {
        &self.value
    }

    pub fn into_val(self) -> Value {
        self.value
    }

    /// For change events: the value before the change.
    pub fn previous(&self) -> Option<&Value> {
        self.previous.as_ref()
    }

    pub fn exists(&self) -> bool {
        !self.value.is_null()
    }

    /// Snapshot of a descendant, addressed relative to this one.
    pub fn child(&self, rel: &str) -> DataSnapshot {
        let keys = path::split_to_keys(rel);
        let value = self.value.get_in(&keys).cloned().unwrap_or_default();
        DataSnapshot::new(self.reference.child(rel), value)
    }

    pub fn has_child(&self, rel: &str) -> bool {
        self.value
            .get_in(&path::split_to_keys(rel))
            .map_or(false, |v| !v.is_null())
    }

    pub fn has_children(&self) -> bool {
        self.num_children() > 0
    }

    pub fn num_children(&self) -> usize {
        self.value.children().len()
    }

    /// Visits each child in order until `f` returns `false`.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(DataSnapshot) -> bool,
    {
        for (key, value) in self.value.children() {
            let child = DataSnapshot::new(self.reference.child_at(&key), value.clone());
            if !f(child) {
                break;
            }
        }
    }
}

impl fmt::Debug for DataSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSnapshot")
            .field("path", &self.reference.path())
            .field("value", &self.value)
            .finish()
    }
}
