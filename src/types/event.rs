use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Kinds of events a reference can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// The value at the subscribed path changed
    Value,
    /// A new child appeared under the subscribed path
    ChildAdded,
    /// An existing child's value changed
    ChildChanged,
    /// A child was removed; the payload carries its previous value
    ChildRemoved,
}

impl EventKind {
    /// Whether this event reports on direct children rather than the node itself.
    pub fn is_child_event(self) -> bool {
        !matches!(self, EventKind::Value)
    }
}
