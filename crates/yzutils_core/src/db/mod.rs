//! SQLite connection bootstrap for accessor callers.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections ready for CRUD access.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON` and a busy timeout set.
//! - Schema management stays with the caller; nothing here creates tables.

mod open;

pub use open::{open_db, open_db_in_memory, BUSY_TIMEOUT};

pub type DbResult<T> = Result<T, rusqlite::Error>;
