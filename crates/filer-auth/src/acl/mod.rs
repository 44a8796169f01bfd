//! Folder grants with ancestor inheritance and fixed-cost batched resolution.

pub mod inheritance;
pub mod resolver;
pub mod snapshot;

pub use inheritance::{ChainVerdict, walk_chain};
pub use resolver::PermissionResolver;
pub use snapshot::{Decision, EffectiveRights, PermissionSnapshot, PermissionSource};
