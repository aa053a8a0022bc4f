//! Persistence layer for the retreat portal.
//!
//! This crate contains:
//! - The table store abstraction and its Postgres and in-memory backends
//! - Connection pool management and query metrics
//! - Entity definitions (row mappings)
//! - Repository implementations

pub mod db;
pub mod entities;
pub mod memory;
pub mod metrics;
pub mod pg;
pub mod repositories;
pub mod store;

pub use memory::MemoryTableStore;
pub use pg::PgTableStore;
pub use store::{SharedStore, StoreError, StoreErrorKind, Table, TableStore};
