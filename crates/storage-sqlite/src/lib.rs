//! SQLite storage for plan sessions.
//!
//! Reads go through an r2d2 pool; every write is funnelled through a single writer
//! thread so SQLite never sees two concurrent writers.

pub mod db;
pub mod errors;
pub mod plans;

pub use db::{Database, DbPool, WriteHandle};
pub use errors::StorageError;
pub use plans::PlanRepository;
