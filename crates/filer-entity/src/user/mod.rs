//! Acting principals.

pub mod actor;

pub use actor::Actor;
