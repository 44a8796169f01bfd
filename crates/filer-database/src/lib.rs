//! # filer-database
//!
//! Store traits for the folder tree and folder grants, their PostgreSQL
//! implementations, connection management and migrations, plus an
//! in-memory store with round-trip accounting.

pub mod connection;
pub mod memory;
pub mod migration;
pub mod repositories;
pub mod store;

pub use connection::DatabasePool;
pub use memory::MemoryStore;
pub use repositories::{PgGrantStore, PgTreeStore};
pub use store::{Change, ChangeSet, GrantStore, TreeStore};
