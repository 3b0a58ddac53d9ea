//! Backend utility layers.
//!
//! - [`repo`]: generic per-entity CRUD accessor over SQLite.
//! - [`logging`]: per-application log directories, per-level files and
//!   named loggers.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;

pub use logging::{
    get_logger, get_request_logger, init_logging, logging_settings, AppLogger, LogSettings,
    LoggerRegistry, LoggingError, Severity,
};
pub use model::change_set::{ChangeSet, Payload};
pub use model::schema::{Schema, SchemaError};
pub use repo::{
    CrudAccessor, CrudError, CrudResult, Entity, Filter, ListQuery, Mutation, UpdateTarget,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
