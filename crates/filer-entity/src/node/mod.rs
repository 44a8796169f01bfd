//! Polymorphic node over folders and files.

pub mod model;

pub use model::{Node, NodeKind, NodeRef};
