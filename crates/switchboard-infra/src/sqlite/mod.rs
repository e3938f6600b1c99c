//! SQLite storage layer.
//!
//! `KvStore` implementation backed by SQLite with WAL mode and split
//! read/write connection pools.

pub mod kv;
pub mod pool;

pub use kv::SqliteKvStore;
pub use pool::{DATABASE_FILE, DatabasePool, database_url};
