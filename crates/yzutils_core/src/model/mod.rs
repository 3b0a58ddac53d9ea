//! Input model for accessor writes.
//!
//! # Responsibility
//! - Define the change-set shape every write is reduced to.
//! - Define the validated-schema contract callers can pass instead of raw maps.
//!
//! # Invariants
//! - A change-set is always a flat field-name -> JSON value map.
//! - Schema objects are validated before they become a change-set.

pub mod change_set;
pub mod schema;
