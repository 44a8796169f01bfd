//! PostgreSQL implementations of the store traits.

pub mod node;
pub mod permission;

pub use node::PgTreeStore;
pub use permission::PgGrantStore;
