//! Core type definitions for ArborDB

mod event;
mod log_level;
mod storage;
/// The rich in-memory value model.
pub mod value;

pub use event::EventKind;
pub use log_level::LogLevel;
pub use storage::StorageType;
pub use value::{PathReference, Value};
