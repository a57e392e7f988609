//! # Query Module
//!
//! Filtering, ordering and paging over the children of a path:
//! - `types`: operators, filters and the descriptor handed to backends
//! - `matcher`: in-memory evaluation of a descriptor against a node
//! - `engine`: the chainable [`Query`] built from a reference

/// Chainable query builder and executor.
pub mod engine;
pub mod matcher;
pub mod types;

pub use engine::{Query, QueryResults};
pub use types::{
    FilterOperand, FilterPredicate, IntoOperator, QueryDescriptor, QueryFilter, QueryOperator,
    SortKey,
};
