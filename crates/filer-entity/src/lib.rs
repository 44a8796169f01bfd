//! # filer-entity
//!
//! Domain entity models for Filer. Every struct in this crate represents
//! a stored row (folders, files, folder permissions) or a domain value
//! object (node references, rights, actors). All entities derive `Debug`,
//! `Clone`, `Serialize` and `Deserialize`; plain table rows additionally
//! derive `sqlx::FromRow`.

pub mod file;
pub mod folder;
pub mod node;
pub mod permission;
pub mod user;
