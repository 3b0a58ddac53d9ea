//! Generic entity persistence.
//!
//! # Responsibility
//! - Define the entity contract mapped onto one SQLite table.
//! - Provide the per-entity CRUD accessor and its filter/list options.
//! - Isolate SQL text construction from accessor orchestration.
//!
//! # Invariants
//! - One accessor instance serves exactly one entity type.
//! - Accessor APIs return semantic errors (`NotFound`, `MissingTarget`) in
//!   addition to storage errors.

pub mod crud;
pub mod entity;
pub mod query;

pub use crud::{CrudAccessor, CrudError, CrudResult, Mutation, UpdateTarget};
pub use entity::Entity;
pub use query::{Filter, ListQuery, DEFAULT_LIST_LIMIT};
