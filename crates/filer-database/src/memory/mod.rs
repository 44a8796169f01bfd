//! In-memory store used by tests and embedded setups.

pub mod store;

pub use store::MemoryStore;
