//! Durable key/value reference store.
//!
//! Entities live in named tables and are addressed by a
//! `(partition_key, row_key)` pair, mirroring a cloud table service. Two
//! backends ship here: SQLite through sqlx and an in-memory map for tests.

pub mod error;
pub mod store;
pub mod store_memory;
pub mod store_sqlite;

pub use {
    error::{Error, Result},
    store::{Entity, TableStore, validate_table_name},
    store_memory::InMemoryTableStore,
    store_sqlite::SqliteTableStore,
};
