//! Client-side data access: databases, references, snapshots and the event
//! streams subscriptions deliver through.

pub mod database;
pub mod id;
pub mod reference;
pub mod snapshot;
pub mod stream;
pub mod type_mappings;

pub use database::Database;
pub use id::{IdGenerator, PushIdGenerator};
pub use reference::{event_callback, DataReference, EventCallback};
pub use snapshot::DataSnapshot;
pub use stream::{EventStream, StreamSubscription};
pub use type_mappings::{NoTypeMappings, TypeCodec, TypeMappingRegistry, TypeMappings};
