//! # filer-auth
//!
//! Folder permission resolution for Filer.
//!
//! ## Modules
//!
//! - `acl`: ancestor-chain inheritance, batched permission snapshots and
//!   the resolver that ties them to the stores

pub mod acl;

pub use acl::{Decision, EffectiveRights, PermissionResolver, PermissionSnapshot, PermissionSource};
