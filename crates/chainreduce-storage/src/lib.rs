//! chainreduce-storage — pluggable entity store backends for chainreduce.
//!
//! Backends:
//! - [`memory`] — in-memory (dev/testing, no persistence)
//! - [`sqlite`] — SQLite via `sqlx` (embedded, single-file persistence)
//! - `postgres` — PostgreSQL via `sqlx` (feature reserved)
//!
//! Every backend implements `chainreduce_core::EntityStore` with the same
//! contract: point reads by key and compare-and-set writes on the entity
//! version.

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryEntityStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteEntityStore;
